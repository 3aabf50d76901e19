pub mod booking_service;
pub mod cleanup;
pub mod document_service;

#[cfg(test)]
pub mod testing;
