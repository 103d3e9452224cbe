pub const TOPIC_RADIO_PREFIX: &str = "packetthermostat/radio/";
pub const TOPIC_RADIO_ALL: &str = "packetthermostat/radio/+";
pub const TOPIC_COMMAND: &str = "packetthermostat/cmnd";

pub const TOPIC_CONTROLLER_STATE: &str = "packetthermostat/controller/state";
pub const TOPIC_CONTROLLER_OUTPUTS: &str = "packetthermostat/controller/outputs";

pub fn radio_topic(sender_id: u8) -> String {
    format!("{TOPIC_RADIO_PREFIX}{sender_id}")
}

pub fn sender_from_topic(topic: &str) -> Option<u8> {
    topic.strip_prefix(TOPIC_RADIO_PREFIX)?.parse().ok()
}
