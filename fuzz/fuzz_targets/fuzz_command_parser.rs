//! Fuzz target: `NodeCommand::parse`
//!
//! Feeds arbitrary bytes as a command-topic payload and checks that a
//! parsed command agrees with the keys of the JSON object.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensornode::app::commands::NodeCommand;

fuzz_target!(|data: &[u8]| {
    let Ok(cmd) = NodeCommand::parse(data) else {
        return;
    };
    let doc: serde_json::Value =
        serde_json::from_slice(data).expect("a parsed command is valid JSON");
    match cmd {
        NodeCommand::Reset => assert!(doc.get("reset").is_some()),
        NodeCommand::Restart => assert!(doc.get("restart").is_some()),
    }
});
