pub mod allocator;
pub mod overdue;
