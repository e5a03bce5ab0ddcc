// =============================================================================
// RTK: Kernel Synchronization Primitives
// =============================================================================
//
//   spinlock.rs: ticket spinlock guarding the process table
//   park.rs    : park/unpark handshake used by blocking receive
//
// Lock ordering rules:
//   The process table lock and the message queue lock are independent and
//   are NEVER held at the same time. A parker that touches the process
//   table is only ever called after the queue lock has been released.
// =============================================================================

pub mod park;
pub mod spinlock;
