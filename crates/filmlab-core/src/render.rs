//! Explicit rendering context for CPU pixel work.
//!
//! Every per-pixel pass in the crate runs row-parallel through a
//! [`RenderContext`]. The context owns an optional dedicated rayon pool;
//! without one, work lands on rayon's global pool.
//!
//! # Thread safety
//! The context is `Send + Sync` and holds no mutable state, so any number of
//! pipeline runs may share one instance behind an `Arc`.

use rayon::prelude::*;

use crate::error::PipelineError;

/// Owns the thread pool used for per-pixel work.
#[derive(Debug, Default)]
pub struct RenderContext {
    pool: Option<rayon::ThreadPool>,
}

impl RenderContext {
    /// Context backed by rayon's global pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Context with a dedicated pool of `threads` workers.
    ///
    /// `threads == 0` lets rayon pick the count from the available cores.
    pub fn with_threads(threads: usize) -> Result<Self, PipelineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("filmlab-render-{i}"))
            .build()
            .map_err(|e| PipelineError::Context(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of worker threads pixel passes are spread across.
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Fill a fresh `width × height` buffer row by row.
    ///
    /// `row_fn(y, row)` receives the row index and the output row slice.
    pub fn map_rows<F>(&self, width: u32, height: u32, row_fn: F) -> Vec<[f32; 4]>
    where
        F: Fn(u32, &mut [[f32; 4]]) + Send + Sync,
    {
        let w = width as usize;
        let mut out = vec![[0.0_f32; 4]; w * height as usize];
        if out.is_empty() {
            return out;
        }

        let run = |out: &mut Vec<[f32; 4]>| {
            out.par_chunks_mut(w)
                .enumerate()
                .for_each(|(y, row)| row_fn(y as u32, row));
        };

        match &self.pool {
            Some(pool) => pool.install(|| run(&mut out)),
            None => run(&mut out),
        }
        out
    }

    /// Per-pixel map over `src`, producing a new buffer.
    pub fn map_pixels<F>(&self, src: &[[f32; 4]], width: u32, height: u32, pixel_fn: F) -> Vec<[f32; 4]>
    where
        F: Fn([f32; 4]) -> [f32; 4] + Send + Sync,
    {
        let w = width as usize;
        self.map_rows(width, height, |y, row| {
            let start = y as usize * w;
            for (dst, &px) in row.iter_mut().zip(&src[start..start + w]) {
                *dst = pixel_fn(px);
            }
        })
    }
}
