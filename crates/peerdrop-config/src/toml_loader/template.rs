/// Default TOML config content with inline documentation comments.
pub fn default_config_toml() -> String {
    r##"# peerdrop configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[relay]
# url = "ws://127.0.0.1:8080/ws"
# reconnect_delay_secs = 3       # 1-300, fixed delay between attempts
# connect_timeout_secs = 15      # 1-120

[transfer]
# chunk_size = 16384             # 1024-262144 bytes per chunk
# verify_digest = false          # send and check a SHA-256 of the file
# negotiation_timeout_secs = 30  # 0 disables
# stall_timeout_secs = 60        # 0 disables
# receive_dir = ""               # empty = platform download directory

[transport]
# bind_host = "0.0.0.0"
# advertise_host = ""           # address the receiver dials; empty = detect

[logging]
# level = "INFO"                 # TRACE, DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
