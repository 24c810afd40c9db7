//! Watch command: poll selected sailings and book the first free one.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;

use fw_core::{MonitorController, PartyDetails, RouteDirection, SessionOutcome, SlotWatchSpec};
use fw_praamid::{Client, Departure};

use crate::Config;
use crate::console::ConsoleSink;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Route direction code (e.g. HR, RH, KV, VK).
    #[arg(long)]
    pub direction: RouteDirection,

    /// Departure date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Sailing uid to watch, as shown by `fw schedule`. Repeat to watch
    /// several; earlier ones win when several open up at once.
    #[arg(long = "slot", required = true)]
    pub slots: Vec<String>,

    /// Contact email for the booking (overrides config).
    #[arg(long)]
    pub email: Option<String>,

    /// Contact phone for the booking (overrides config).
    #[arg(long)]
    pub phone: Option<String>,

    /// Vehicle registration number (overrides config).
    #[arg(long)]
    pub vehicle: Option<String>,

    /// Book passenger tickets only.
    #[arg(long)]
    pub no_vehicle: bool,

    /// Number of adult passengers.
    #[arg(long, default_value_t = 1)]
    pub adults: u32,
}

/// Combines flags with configured defaults. Flags win.
pub fn party_details(args: &WatchArgs, config: &Config) -> PartyDetails {
    let pick = |flag: &Option<String>, configured: &Option<String>| {
        flag.clone()
            .or_else(|| configured.clone())
            .unwrap_or_default()
    };
    let vehicle_count = u32::from(!args.no_vehicle);
    let vehicle_registration = if args.no_vehicle {
        None
    } else {
        args.vehicle
            .clone()
            .or_else(|| config.vehicle_registration.clone())
    };

    PartyDetails {
        contact_email: pick(&args.email, &config.contact_email),
        contact_phone: pick(&args.phone, &config.contact_phone),
        vehicle_registration,
        vehicle_count,
        adult_count: args.adults,
    }
}

/// Picks the requested sailings from the schedule, in the order given.
pub fn select_slots(
    departures: &[Departure],
    wanted: &[String],
    direction: &RouteDirection,
    date: NaiveDate,
) -> Result<Vec<SlotWatchSpec>> {
    wanted
        .iter()
        .map(|uid| {
            departures
                .iter()
                .find(|departure| departure.slot_id.as_str() == uid)
                .map(|departure| departure.to_watch_spec(direction, date))
                .with_context(|| format!("sailing {uid} not found for {direction} on {date}"))
        })
        .collect()
}

/// Whether a resolved ctrl-c listener means the user asked to stop.
///
/// A listener that failed to install is not an interrupt; watching goes on.
fn interrupt_requested(signal: std::io::Result<()>) -> bool {
    match signal {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "failed to listen for ctrl-c; continuing without it");
            false
        }
    }
}

pub fn run<W: Write>(writer: &mut W, args: &WatchArgs, config: &Config) -> Result<()> {
    let date = args.date.unwrap_or_else(super::today);
    let party = party_details(args, config);
    party.validate().context("invalid booking details")?;

    let client = Client::new(config.client_config()).context("failed to create API client")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let outcome = runtime.block_on(async {
        let departures = client
            .list_departures(&args.direction, date)
            .await
            .with_context(|| {
                format!("failed to fetch schedule for {} on {date}", args.direction)
            })?;
        let specs = select_slots(&departures, &args.slots, &args.direction, date)?;

        let client = Arc::new(client);
        let controller = MonitorController::new(
            client.clone(),
            client,
            Arc::new(ConsoleSink::stderr()),
        )
        .with_poll_interval(config.poll_interval());
        let handle = controller
            .start(specs, party)
            .context("failed to start monitoring")?;

        let outcome = tokio::select! {
            outcome = handle.wait() => outcome,
            signal = tokio::signal::ctrl_c() => {
                if interrupt_requested(signal) {
                    controller.stop();
                }
                handle.wait().await
            }
        };
        anyhow::Ok(outcome)
    })?;

    match outcome {
        SessionOutcome::Booked {
            slot_id,
            confirmation,
        } => {
            writeln!(writer, "Booked sailing {slot_id}.")?;
            writeln!(writer, "Booking UID: {}", confirmation.booking_reference)?;
            if let Some(checkout) = confirmation.checkout_reference {
                writeln!(writer, "Complete payment at: {checkout}")?;
            }
            Ok(())
        }
        SessionOutcome::BookingFailed { slot_id, error } => {
            bail!("booking sailing {slot_id} failed: {error}")
        }
        SessionOutcome::Cancelled => {
            writeln!(writer, "Monitoring cancelled.")?;
            Ok(())
        }
    }
}
