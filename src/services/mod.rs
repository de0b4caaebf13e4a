pub mod file_service;
pub mod garbage_service;
pub mod llm_service;
pub mod organize_service;
pub mod preview_service;
pub mod snapshot_service;
