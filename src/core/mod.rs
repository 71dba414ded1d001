//! Core module - routing, task intake, and system assembly.
//!
//! This module contains the coordination substrate:
//! - The router with its registry, message history, and dead letters
//! - Task records and their status lifecycle
//! - Assembly of agents into a system with bound roles

pub mod router;
pub mod system;
pub mod task;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use router::{DeadLetter, Delivery, Router, RouterStatus};
pub use system::{System, SystemBuilder};
pub use task::{TaskRecord, TaskStatus};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
