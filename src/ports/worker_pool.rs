//! WorkerPool port - where asynchronous handler invocations run.

/// A unit of work handed to a pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Port for offloading handler invocations.
///
/// Dispatch only needs to hand work over; ordering between separately
/// submitted tasks is up to the pool.
pub trait WorkerPool: Send + Sync {
    fn submit(&self, task: Task);
}
