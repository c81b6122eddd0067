//! Generate a pulse report for validation testing

fn main() {
    let records = r#"{
        "messages": [
            { "user_id": "101", "timestamp": "2024-01-15T10:00:00Z", "content": "Great release, thanks!", "channel_name": "general" },
            { "user_id": 102, "timestamp": "2024-01-15T11:30:00Z", "content": "the installer is broken", "channel_name": "support" },
            { "author": { "id": "103" }, "timestamp": 1705402800000, "content": "hello everyone", "channel_name": "welcome" },
            { "user_id": "101", "timestamp": "2024-01-16 18:00:00+00", "content": "love the new docs", "channel_name": "general" }
        ],
        "members": [
            { "user_id": "101", "username": "alice", "joined_at": "2024-01-02T09:00:00Z", "last_active": "2024-01-16T18:00:00Z", "is_active": true },
            { "user_id": "102", "username": "bob", "joined_at": "2023-11-20T09:00:00Z", "last_active": "2024-01-15T11:30:00Z", "is_active": true },
            { "user_id": "103", "username": "carol", "joined_at": "2024-01-16T08:00:00Z", "is_active": true }
        ],
        "voice_activity": [
            { "user_id": "101", "channel_name": "lounge", "joined_at": "2024-01-15T20:00:00Z", "left_at": "2024-01-15T20:45:00Z" }
        ]
    }"#;
    let request = r#"{ "start": "2024-01-10", "end": "2024-01-16", "now": "2024-01-17T00:00:00Z" }"#;

    match community_pulse::records_to_report(records.to_string(), request.to_string()) {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
