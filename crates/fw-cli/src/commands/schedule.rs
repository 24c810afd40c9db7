//! Schedule command for listing the sailings of a day.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use fw_core::RouteDirection;
use fw_praamid::{Client, Departure};

use crate::Config;
use crate::console::format_time;

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Route direction code (e.g. HR, RH, KV, VK).
    #[arg(long)]
    pub direction: RouteDirection,

    /// Departure date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ScheduleArgs, config: &Config) -> Result<()> {
    let date = args.date.unwrap_or_else(super::today);
    let client = Client::new(config.client_config()).context("failed to create API client")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let departures = runtime
        .block_on(client.list_departures(&args.direction, date))
        .with_context(|| format!("failed to fetch schedule for {} on {date}", args.direction))?;

    if args.json {
        render_json(writer, &departures)
    } else {
        render_table(writer, &departures)
    }
}

fn render_table<W: Write>(writer: &mut W, departures: &[Departure]) -> Result<()> {
    if departures.is_empty() {
        writeln!(writer, "No sailings found for the selected date and direction.")?;
        return Ok(());
    }
    for departure in departures {
        let cars = departure
            .car_capacity
            .map_or_else(|| "N/A".to_string(), |cars| cars.to_string());
        writeln!(
            writer,
            "{}  {}-{} UTC  cars: {}  ship: {}  pricelist: {}",
            departure.slot_id,
            format_time(Some(departure.departs_at)),
            format_time(departure.arrives_at),
            cars,
            departure.ship_code.as_deref().unwrap_or("N/A"),
            departure.pricelist_code.as_deref().unwrap_or("N/A"),
        )?;
    }
    Ok(())
}

fn render_json<W: Write>(writer: &mut W, departures: &[Departure]) -> Result<()> {
    let rows: Vec<_> = departures
        .iter()
        .map(|departure| {
            serde_json::json!({
                "uid": departure.slot_id,
                "departs_at": departure.departs_at,
                "arrives_at": departure.arrives_at,
                "car_capacity": departure.car_capacity,
                "ship": departure.ship_code,
                "pricelist": departure.pricelist_code,
            })
        })
        .collect();
    writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use serde_json::json;

    use super::*;

    fn departures() -> Vec<Departure> {
        vec![
            Departure {
                slot_id: fw_core::SlotId::new("evt-1").unwrap(),
                departs_at: "2026-10-20T07:30:00Z".parse().unwrap(),
                arrives_at: "2026-10-20T08:00:00Z".parse().ok(),
                car_capacity: Some(4),
                ship_code: Some("TIIU".to_string()),
                pricelist_code: Some("HR-2026".to_string()),
                raw: json!({}),
            },
            Departure {
                slot_id: fw_core::SlotId::new("evt-2").unwrap(),
                departs_at: "2026-10-20T09:15:00Z".parse().unwrap(),
                arrives_at: None,
                car_capacity: None,
                ship_code: None,
                pricelist_code: None,
                raw: json!({}),
            },
        ]
    }

    #[test]
    fn table_lists_each_sailing() {
        let mut output = Vec::new();
        render_table(&mut output, &departures()).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output.trim_end(), @r"
        evt-1  07:30-08:00 UTC  cars: 4  ship: TIIU  pricelist: HR-2026
        evt-2  09:15-N/A UTC  cars: N/A  ship: N/A  pricelist: N/A
        ");
    }

    #[test]
    fn table_reports_empty_schedule() {
        let mut output = Vec::new();
        render_table(&mut output, &[]).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "No sailings found for the selected date and direction.\n"
        );
    }

    #[test]
    fn json_rows_use_uid_and_capacity() {
        let mut output = Vec::new();
        render_json(&mut output, &departures()).unwrap();
        let rows: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(rows[0]["uid"], "evt-1");
        assert_eq!(rows[0]["car_capacity"], 4);
        assert_eq!(rows[1]["car_capacity"], serde_json::Value::Null);
    }
}
