//! Business logic for the directory sync API.

pub mod sync_service;
