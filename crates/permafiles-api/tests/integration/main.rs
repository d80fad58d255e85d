//! Integration tests for permafiles-api
//!
//! Uses wiremock to simulate the archive service and verifies the request
//! bodies, status handling and transfers of the HttpDispatcher, plus the
//! repository running on top of it, share link calls included.

mod common;

mod test_envelope_calls;
mod test_repository;
mod test_shares;
mod test_transfers;
