use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use packet_thermostat_common::radio_topic;

const DEFAULT_SENSOR_ID: u8 = 2;
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);
    let sensor_id = std::env::var("SENSOR_ID")
        .ok()
        .and_then(|value| value.parse::<u8>().ok())
        .unwrap_or(DEFAULT_SENSOR_ID);

    let mut mqtt_options = MqttOptions::new(
        format!("packet-thermostat-sensor-{sensor_id}"),
        mqtt_host,
        mqtt_port,
    );

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    let topic = radio_topic(sensor_id);
    info!("sensor {sensor_id} reporting to {topic}");

    let mut count: u32 = 0;
    let mut interval = tokio::time::interval(REPORT_INTERVAL);

    loop {
        interval.tick().await;
        count = count.wrapping_add(1);

        // simulated thermometer drifting around 20 C
        let temp_cx100 = 1950 + i32::try_from(count % 12).unwrap_or(0) * 15;
        let humidity_x100 = 4200 + (count % 6) * 50;
        let battery_mv = 3300 - (count / 120).min(600);

        let payload = format_report(count, battery_mv, temp_cx100, humidity_x100);
        mqtt.publish(topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .context("failed to publish sensor report")?;
    }
}

/// `C:<n>, B:<batt>, T:+DD.DD R:DD.DD`, temperature in hundredths of a
/// degree and humidity in hundredths of a percent.
fn format_report(count: u32, battery_mv: u32, temp_cx100: i32, humidity_x100: u32) -> String {
    let sign = if temp_cx100 < 0 { '-' } else { '+' };
    let temp = temp_cx100.unsigned_abs();
    format!(
        "C:{count}, B:{battery_mv}, T:{sign}{:02}.{:02} R:{:02}.{:02}",
        temp / 100,
        temp % 100,
        humidity_x100 / 100,
        humidity_x100 % 100,
    )
}

#[cfg(test)]
mod tests {
    use packet_thermostat_common::SensorReading;

    use super::*;

    #[test]
    fn report_matches_radio_format() {
        assert_eq!(
            format_report(7, 3300, 2037, 4540),
            "C:7, B:3300, T:+20.37 R:45.40"
        );
        assert_eq!(
            format_report(8, 3100, -375, 905),
            "C:8, B:3100, T:-03.75 R:09.05"
        );
    }

    #[test]
    fn controller_reads_what_sensor_sends() {
        let reading = SensorReading::parse(&format_report(1, 3300, 2037, 4540)).unwrap();

        assert_eq!(reading.temp_cx10, 203);
        assert_eq!(reading.humidity_x10, Some(454));
    }
}
