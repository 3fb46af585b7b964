//! Sample EventSub messages shared by the tests
use serde_json::{json, Value};

pub fn welcome(session_id: &str) -> Value {
    json!({
        "metadata": {
            "message_id": "96a3f3b5-5dec-4eed-908e-e11ee657416c",
            "message_type": "session_welcome",
            "message_timestamp": "2023-07-19T14:56:51.634234626Z"
        },
        "payload": {
            "session": {
                "id": session_id,
                "status": "connected",
                "connected_at": "2023-07-19T14:56:51.616329898Z",
                "keepalive_timeout_seconds": 10,
                "reconnect_url": null
            }
        }
    })
}

pub fn keepalive() -> Value {
    json!({
        "metadata": {
            "message_id": "84c1e79a-2a4b-4c13-ba0b-4312293e9308",
            "message_type": "session_keepalive",
            "message_timestamp": "2023-07-19T10:11:12.634234626Z"
        },
        "payload": {}
    })
}

pub fn redemption_notification(nick: &str) -> Value {
    json!({
        "metadata": {
            "message_id": "befa7b53-d79d-478f-86b9-120f112b044e",
            "message_type": "notification",
            "message_timestamp": "2022-11-16T10:11:12.464757833Z",
            "subscription_type": "channel.channel_points_custom_reward_redemption.add",
            "subscription_version": "1"
        },
        "payload": {
            "subscription": {
                "id": "f1c2a387-161a-49f9-a165-0f21d7a4e1c4",
                "type": "channel.channel_points_custom_reward_redemption.add",
                "version": "1",
                "status": "enabled",
                "cost": 0,
                "condition": { "broadcaster_user_id": "42" },
                "transport": { "method": "websocket", "session_id": "abc123" },
                "created_at": "2022-11-16T10:11:12.464757833Z"
            },
            "event": {
                "id": "17fa2df1-ad76-4804-bfa5-a40ef63efe63",
                "broadcaster_user_id": "42",
                "broadcaster_user_login": "cool_user",
                "broadcaster_user_name": "Cool_User",
                "user_id": "9001",
                "user_login": nick.to_lowercase(),
                "user_name": nick,
                "user_input": "pogchamp",
                "status": "unfulfilled",
                "reward": {
                    "id": "92af127c-7326-4483-a52b-b0da0be61c01",
                    "title": "Hydrate",
                    "cost": 100,
                    "prompt": "Make me drink water"
                },
                "redeemed_at": "2020-07-15T17:16:03.17106713Z"
            }
        }
    })
}
