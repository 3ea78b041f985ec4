pub mod server;

/// Actions resolved from the command line.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        token_key_path: String,
        token_ttl: i64,
        frontend_url: String,
    },
}
