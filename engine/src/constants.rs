//! Application-wide constants and default values
//!
//! Centralizes magic numbers and default configurations for better maintainability

/// Control protocol
pub mod protocol {
    /// Inbound: start a program by name
    pub const START_PROGRAM: &str = "startProgram";

    /// Inbound: stop a program by name
    pub const STOP_PROGRAM: &str = "stopProgram";

    /// Inbound: stop then start a program by name
    pub const RESTART_PROGRAM: &str = "restartProgram";

    /// Outbound state push; inbound envelopes of this type are ignored
    pub const SUBSCRIPTION_PROGRAM: &str = "subscriptionProgram";

    /// Outbound failure report for a rejected command
    pub const COMMAND_ERROR: &str = "commandError";

    /// Header echoed back on failure envelopes
    pub const REQUEST_ID_HEADER: &str = "requestId";

    /// `Any.type_url` used for JSON bodies
    pub const JSON_TYPE_URL: &str = "type.progd.io/json";

    /// Outbound buffer per connection (sends beyond this are dropped)
    pub const OUTBOUND_BUFFER: usize = 64;
}

/// Transport defaults
pub mod transport {
    pub const DEFAULT_GRPC_HOST: &str = "127.0.0.1";
    pub const DEFAULT_GRPC_PORT: u16 = 9090;
}

/// Process lifecycle defaults
pub mod process {
    /// A run at least this long resets the consecutive restart counter (seconds)
    pub const DEFAULT_RUNTIME_SUCCESS_SEC: u64 = 60;

    /// Signal used to terminate a program
    #[cfg(unix)]
    pub const KILL_SIGNAL: i32 = libc::SIGKILL;
}

/// Logging defaults
pub mod logging {
    pub const DEFAULT_LOG_LEVEL: &str = "info";
    pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
    pub const LOG_FILE_NAME: &str = "agent.log";
}

/// Config hot reload
pub mod reload {
    /// Quiet period after a file event before the file is re-read (milliseconds)
    pub const DEBOUNCE_MS: u64 = 200;
}

/// CLI defaults
pub mod cli {
    pub const DEFAULT_CONFIG_PATH: &str = "progd.yaml";
}
