pub mod memory;
pub mod sheets;

pub use memory::MemoryStore;
pub use sheets::SheetsAdapter;
