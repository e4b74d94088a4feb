//! Band data submitted for one day
//!
//! The vendor accepts a day record shaped like the ones uploaded by the
//! phone app. Everything except the date and the step total is a fixed
//! sample taken from a real upload.

use chrono::NaiveDate;
use serde_json::{Value, json};

const HEART_RATE_BLOB: &str = include_str!("assets/data_hr.txt");
const MINUTE_DATA_BLOB: &str = include_str!("assets/minute_data.txt");

const BAND_DEVICE_ID: &str = "DA932FFFFE8816E7";
/// Device reported as the last one synced
pub const LAST_DEVICE_ID: &str = "C4D2D4FFFE8C5068";

/// Walking and running stages of the sample day: (start, stop, mode, dis, cal, step)
const STAGES: [(u32, u32, u8, u32, u32, u32); 17] = [
    (327, 341, 1, 481, 13, 680),
    (342, 367, 3, 2295, 95, 2874),
    (368, 377, 4, 1592, 88, 1664),
    (378, 386, 3, 1072, 51, 1245),
    (387, 393, 4, 1036, 57, 1124),
    (394, 398, 3, 488, 19, 607),
    (399, 414, 4, 2220, 120, 2371),
    (415, 427, 3, 1268, 59, 1489),
    (428, 433, 1, 152, 4, 238),
    (434, 444, 3, 2295, 95, 2874),
    (445, 455, 4, 1592, 88, 1664),
    (456, 466, 3, 1072, 51, 1245),
    (467, 477, 4, 1036, 57, 1124),
    (478, 488, 3, 488, 19, 607),
    (489, 499, 4, 2220, 120, 2371),
    (500, 511, 3, 1268, 59, 1489),
    (512, 522, 1, 152, 4, 238),
];

fn summary(steps: u32) -> Value {
    let stages: Vec<Value> = STAGES
        .iter()
        .map(|&(start, stop, mode, dis, cal, step)| {
            json!({
                "start": start,
                "stop": stop,
                "mode": mode,
                "dis": dis,
                "cal": cal,
                "step": step,
            })
        })
        .collect();

    json!({
        "v": 6,
        "slp": {
            "st": 1628296479,
            "ed": 1628296479,
            "dp": 0,
            "lt": 0,
            "wk": 0,
            "usrSt": -1440,
            "usrEd": -1440,
            "wc": 0,
            "is": 0,
            "lb": 0,
            "to": 0,
            "dt": 0,
            "rhr": 0,
            "ss": 0
        },
        "stp": {
            "ttl": steps,
            "dis": 10627,
            "cal": 510,
            "wk": 41,
            "rn": 50,
            "runDist": 7654,
            "runCal": 397,
            "stage": stages
        },
        "goal": 8000,
        "tz": "28800"
    })
}

/// Value of the `data_json` form field: a one-element array with the day record
pub fn band_data_json(steps: u32, date: NaiveDate) -> String {
    let day = json!({
        "data_hr": HEART_RATE_BLOB,
        "date": date.format("%Y-%m-%d").to_string(),
        "data": [{
            "start": 0,
            "stop": 1439,
            "value": MINUTE_DATA_BLOB,
            "tz": 32,
            "did": BAND_DEVICE_ID,
            "src": 24
        }],
        "summary": summary(steps).to_string(),
        "source": 24,
        "type": 0
    });

    Value::Array(vec![day]).to_string()
}

/// Form fields of a band data submission
pub fn submission_form(
    user_id: &str,
    steps: u32,
    date: NaiveDate,
    now_millis: i64,
) -> Vec<(&'static str, String)> {
    vec![
        ("data_json", band_data_json(steps, date)),
        ("userid", user_id.to_string()),
        ("device_type", "0".to_string()),
        ("last_sync_data_time", now_millis.to_string()),
        ("last_deviceid", LAST_DEVICE_ID.to_string()),
    ]
}
