//! Common test utilities

#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Today's date in UTC (the timezone used by the tests)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// AlAdhan-style timings payload
pub fn aladhan_timings(maghrib: &str, midnight: &str) -> Value {
    json!({
        "code": 200,
        "status": "OK",
        "data": {
            "timings": {
                "Fajr": "05:00",
                "Sunrise": "07:10",
                "Dhuhr": "12:30",
                "Asr": "14:45",
                "Sunset": maghrib,
                "Maghrib": maghrib,
                "Isha": "19:50",
                "Imsak": "04:50",
                "Midnight": format!("{midnight} (UTC)"),
            }
        }
    })
}

/// ICCI timetable payload with one entry for `date`
pub fn icci_timetable(date: NaiveDate, maghrib: (i64, i64)) -> Value {
    let day = json!([[6, 0], [7, 45], [12, 30], [14, 20], [maghrib.0, maghrib.1], [19, 30]]);
    json!({
        "timetable": {
            date.month().to_string(): {
                date.day().to_string(): day
            }
        }
    })
}

/// WordPress year list with a record for `date` and the day after
pub fn wordpress_year(date: NaiveDate) -> Value {
    let record = |d: NaiveDate, fajr: &str| {
        json!({
            "d_date": d.format("%Y-%m-%d").to_string(),
            "fajr_begins": fajr,
            "fajr_jamah": "06:15:00",
            "sunrise": "07:30:00",
            "zuhr_begins": "12:25:00",
            "asr_mithl_1": "14:10:00",
            "maghrib_begins": "16:40:00",
            "isha_begins": "18:20:00",
            "hijri_date": "1445-06-12",
            "is_ramadan": "0",
        })
    };
    let tomorrow = date.succ_opt().unwrap_or(date);
    json!([[record(date, "06:05:00"), record(tomorrow, "06:06:00")]])
}

/// WordPress today payload
pub fn wordpress_today() -> Value {
    json!([{
        "d_date": today().format("%Y-%m-%d").to_string(),
        "fajr_begins": "06:05",
        "sunrise": "07:30",
        "zuhr_begins": "12:25",
        "asr_mithl_1": "14:10",
        "maghrib_begins": "16:40",
        "isha_begins": "18:20"
    }])
}

/// neoHub INFO response with one thermostat and one plug
pub fn neohub_info() -> Value {
    json!({
        "devices": [
            {
                "device": "Lounge",
                "DEVICE_TYPE": 1,
                "CURRENT_TEMPERATURE": "21.5",
                "CURRENT_SET_TEMPERATURE": "20.0",
                "HUMIDITY": 45,
                "HEATING": true,
                "COOLING": false,
                "TEMP_HOLD": false,
                "HOLD_TEMPERATURE": 19,
                "STANDBY": false,
                "TEMPERATURE_FORMAT": false
            },
            { "device": "Lamp", "DEVICE_TYPE": 6 }
        ]
    })
}

/// neoHub ENGINEERS_DATA response
pub fn neohub_engineers() -> Value {
    json!({
        "Lounge": { "FROST TEMPERATURE": 12, "SWITCHING DIFFERENTIAL": 1, "OUTPUT DELAY": 0 }
    })
}

/// Speaker `/getUpdate` response
pub fn speaker_status() -> Value {
    json!({
        "state": "STATE_PLAYING",
        "volume": "0.4",
        "sources": ["tv", "radio", "adhan"],
        "current_source": "adhan",
        "current_priority": 5,
        "duration": 180,
        "position": 12.5
    })
}

/// Fake neoHub on a local port
///
/// Answers INFO and ENGINEERS_DATA from the fixtures and `{"result":"ok"}`
/// to anything else. Every request frame is recorded.
pub struct FakeHub {
    pub port: u16,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl FakeHub {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.ends_with(b"\0\r") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&buf[..buf.len() - 2]).to_string();
                    let response = if request.contains("\"INFO\"") {
                        neohub_info()
                    } else if request.contains("\"ENGINEERS_DATA\"") {
                        neohub_engineers()
                    } else {
                        json!({ "result": "ok" })
                    };
                    recorded.lock().unwrap().push(request);

                    let mut frame = response.to_string().into_bytes();
                    frame.extend_from_slice(b"\0\n");
                    let _ = stream.write_all(&frame).await;
                });
            }
        });

        Self { port, requests }
    }

    /// Recorded requests other than the status polls
    pub fn commands(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.contains("\"INFO\"") && !r.contains("\"ENGINEERS_DATA\""))
            .cloned()
            .collect()
    }
}
