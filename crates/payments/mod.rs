pub mod instamojo_client;
pub mod webhook_signature;
