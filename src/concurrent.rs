//! An abstraction over how tiles are dispatched to workers.
//!
//! Tiles are independent, so the baker hands the executor one closure per
//! tile and collects the results in tile order.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::Execution;
use crate::error::ConfigError;

pub trait Executor {
    /// Calls `builder` for every index in `0..length` and returns the
    /// results in index order.
    fn build_vector<T, F>(&self, length: usize, builder: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync;
}

/// Runs everything on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn build_vector<T, F>(&self, length: usize, builder: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        (0..length).map(builder).collect()
    }
}

/// Runs on rayon, either on the global pool or on a dedicated one.
#[derive(Debug, Default)]
pub struct RayonExecutor {
    pool: Option<ThreadPool>,
}

impl RayonExecutor {
    /// Uses rayon's global pool.
    pub fn global() -> Self {
        Self { pool: None }
    }

    /// Builds a dedicated pool with `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, ConfigError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tilebake-{i}"))
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }
}

impl Executor for RayonExecutor {
    fn build_vector<T, F>(&self, length: usize, builder: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        let run = || -> Vec<T> { (0..length).into_par_iter().map(&builder).collect() };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// The executor selected by [`Execution`].
#[derive(Debug)]
pub enum TileExecutor {
    Sequential(SequentialExecutor),
    Rayon(RayonExecutor),
}

impl TileExecutor {
    pub fn from_execution(execution: Execution) -> Result<Self, ConfigError> {
        Ok(match execution {
            Execution::Sequential => TileExecutor::Sequential(SequentialExecutor),
            Execution::Parallel { threads: None } => TileExecutor::Rayon(RayonExecutor::global()),
            Execution::Parallel { threads: Some(n) } => TileExecutor::Rayon(RayonExecutor::with_threads(n)?),
        })
    }
}

impl Executor for TileExecutor {
    fn build_vector<T, F>(&self, length: usize, builder: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        match self {
            TileExecutor::Sequential(executor) => executor.build_vector(length, builder),
            TileExecutor::Rayon(executor) => executor.build_vector(length, builder),
        }
    }
}
