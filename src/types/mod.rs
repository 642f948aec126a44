// file: src/types/mod.rs
// version: 1.0.0
// guid: 1482686c-c8d0-4d4a-b176-fdf7febfcb6f

//! Validated value types shared by the command line and the engine

pub mod byte_size;
pub mod disk_id;
pub mod machine_id;
pub mod uuid;

pub use byte_size::format_byte_size;
pub use disk_id::DiskId;
pub use machine_id::MachineId;
pub use uuid::FsUuid;
