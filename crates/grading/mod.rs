pub mod oracle_client;
