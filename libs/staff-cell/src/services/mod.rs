pub mod directory;

pub use directory::{directory_order, InMemoryStaffDirectory, StaffDirectory, SupabaseStaffDirectory};
