//! Integration tests for boxsync-api
//!
//! Uses wiremock to simulate the Box API and the OAuth2 token endpoint and
//! verifies end-to-end behavior of the session, the request executor and
//! the remote tree client.

mod common;

mod test_executor;
mod test_remote_tree;
mod test_session;
