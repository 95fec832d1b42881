//! Colourful console output for planner events.
//!
//! Provides a `tracing` layer that formats planner lifecycle events with colours.
//!
//! ## Log Levels
//!
//! - **INFO**: Lifecycle events (hierarchical/monolevel start and end, increments, proactive divisions)
//! - **DEBUG**: Progress (sub-goal stages achieved, reactive divisions)
//! - **TRACE**: Individual search increments

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();
static PLAN_START_NANOS: AtomicU64 = AtomicU64::new(0);

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the planner console output.
///
/// Safe to call multiple times; only the first call has effect.
/// `RUST_LOG` overrides the default `hiplan_solver=info` directive.
pub fn init() {
    INIT.get_or_init(|| {
        print_banner();

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(
                std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "hiplan_solver=info".into()),
            );

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(PlannerConsoleLayer)
            .try_init();
    });
}

fn mark_plan_start() {
    let epoch = EPOCH.get_or_init(Instant::now);
    let nanos = epoch.elapsed().as_nanos() as u64;
    PLAN_START_NANOS.store(nanos, Ordering::Relaxed);
}

// Seconds since the last hierarchical planning call started.
fn elapsed_secs() -> f64 {
    let Some(epoch) = EPOCH.get() else {
        return 0.0;
    };
    let start_nanos = PLAN_START_NANOS.load(Ordering::Relaxed);
    let now_nanos = epoch.elapsed().as_nanos() as u64;
    now_nanos.saturating_sub(start_nanos) as f64 / 1_000_000_000.0
}

fn print_banner() {
    let banner = r#"
 _     _       _
| |__ (_)_ __ | | __ _ _ __
| '_ \| | '_ \| |/ _` | '_ \
| | | | | |_) | | (_| | | | |
|_| |_|_| .__/|_|\__,_|_| |_|
        |_|
"#;

    let version_line = format!("     v{} - Hierarchical Incremental Planner\n", VERSION);

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_cyan());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats planner events with colours.
pub struct PlannerConsoleLayer;

impl<S: Subscriber> Layer<S> for PlannerConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("hiplan") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, *metadata.level());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Debug, Default)]
struct EventVisitor {
    event: Option<String>,
    message: Option<String>,
    planner: Option<String>,
    method: Option<String>,
    strategy: Option<String>,
    levels: Option<String>,
    problem: Option<String>,
    point: Option<String>,
    result: Option<String>,
    level: Option<u64>,
    bottom_level: Option<u64>,
    top_level: Option<u64>,
    increment: Option<u64>,
    increments: Option<u64>,
    index: Option<u64>,
    step: Option<u64>,
    start_step: Option<u64>,
    end_step: Option<u64>,
    achieved: Option<u64>,
    total: Option<u64>,
    problems: Option<u64>,
    plan_length: Option<u64>,
    total_actions: Option<u64>,
    requested: Option<u64>,
    clamped: Option<u64>,
    time: Option<f64>,
    online: Option<bool>,
    is_final: Option<bool>,
    interrupting: Option<bool>,
    saved_grounding: Option<bool>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value).trim_matches('"').to_string();
        match field.name() {
            "event" => self.event = Some(s),
            "message" => self.message = Some(s),
            "planner" => self.planner = Some(s),
            "method" => self.method = Some(s),
            "strategy" => self.strategy = Some(s),
            "levels" => self.levels = Some(s),
            "problem" => self.problem = Some(s),
            "point" => self.point = Some(s),
            "result" => self.result = Some(s),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "strategy" => self.strategy = Some(value.to_string()),
            _ => self.record_debug(field, &value),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "level" => self.level = Some(value),
            "bottom_level" => self.bottom_level = Some(value),
            "top_level" => self.top_level = Some(value),
            "increment" => self.increment = Some(value),
            "increments" => self.increments = Some(value),
            "index" => self.index = Some(value),
            "step" => self.step = Some(value),
            "start_step" => self.start_step = Some(value),
            "end_step" => self.end_step = Some(value),
            "achieved" => self.achieved = Some(value),
            "total" => self.total = Some(value),
            "problems" => self.problems = Some(value),
            "plan_length" => self.plan_length = Some(value),
            "total_actions" => self.total_actions = Some(value),
            "requested" => self.requested = Some(value),
            "clamped" => self.clamped = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value.max(0) as u64);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == "time" {
            self.time = Some(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "online" => self.online = Some(value),
            "is_final" => self.is_final = Some(value),
            "interrupting" => self.interrupting = Some(value),
            "saved_grounding" => self.saved_grounding = Some(value),
            _ => {}
        }
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    match v.event.as_deref().unwrap_or("") {
        "hierarchical_start" => format_hierarchical_start(v),
        "hierarchical_end" => format_hierarchical_end(v),
        "increment_start" => format_increment_start(v),
        "monolevel_start" => format_monolevel_start(v),
        "monolevel_end" => format_monolevel_end(v),
        "proactive_division" => format_proactive_division(v),
        "reactive_division" => format_reactive_division(v),
        "sgoal_achieved" => format_sgoal_achieved(v),
        "search_increment" => format_search_increment(v, level),
        "clamping" => format_clamping(v),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs())
        .bright_black()
        .to_string()
}

fn count(value: Option<u64>) -> String {
    value.unwrap_or(0).to_formatted_string(&Locale::en)
}

fn format_hierarchical_start(v: &EventVisitor) -> String {
    mark_plan_start();
    let mode = if v.online.unwrap_or(false) {
        format!(
            "online {} │ {}",
            v.method.as_deref().unwrap_or("ground_first").bright_yellow(),
            v.strategy.as_deref().unwrap_or("none").bright_magenta()
        )
    } else {
        "offline".bright_yellow().to_string()
    };

    format!(
        "{} {} Planning {} │ levels [{}-{}] │ {}",
        format_elapsed(),
        "▶".bright_green().bold(),
        v.planner.as_deref().unwrap_or("").white().bold(),
        count(v.bottom_level).bright_yellow(),
        count(v.top_level).bright_yellow(),
        mode
    )
}

fn format_hierarchical_end(v: &EventVisitor) -> String {
    format!(
        "{} {} Planning complete │ {} increments │ {} steps │ {} actions │ {}",
        format_elapsed(),
        "■".bright_cyan().bold(),
        count(v.increments).white(),
        count(v.plan_length).bright_yellow(),
        count(v.total_actions).bright_yellow(),
        format_seconds(v.time.unwrap_or(0.0)).yellow()
    )
}

fn format_increment_start(v: &EventVisitor) -> String {
    format!(
        "{} {} Increment {} │ levels {}",
        format_elapsed(),
        "⚡".bright_cyan(),
        count(v.increment).white().bold(),
        v.levels.as_deref().unwrap_or("[]").bright_yellow()
    )
}

fn format_monolevel_start(v: &EventVisitor) -> String {
    let mut output = format!(
        "{} {} Level {} │ {}",
        format_elapsed(),
        "▶".bright_blue(),
        count(v.level).white().bold(),
        v.problem.as_deref().unwrap_or("")
    );
    if v.saved_grounding.unwrap_or(false) {
        output.push_str(&format!(" │ {}", "resumed".bright_magenta()));
    }
    output
}

fn format_monolevel_end(v: &EventVisitor) -> String {
    let status = if v.is_final.unwrap_or(false) {
        "final".bright_green().bold().to_string()
    } else {
        "partial".yellow().to_string()
    };
    format!(
        "{} {} Level {} │ {} steps │ {} actions │ {} │ {}",
        format_elapsed(),
        "◀".bright_blue(),
        count(v.level).white().bold(),
        count(v.plan_length).white(),
        count(v.total_actions).white(),
        format_seconds(v.time.unwrap_or(0.0)).yellow(),
        status
    )
}

fn format_proactive_division(v: &EventVisitor) -> String {
    format!(
        "{} {} Divided level {} steps [{}-{}] into {} problems │ {}",
        format_elapsed(),
        "✂".bright_magenta(),
        count(v.level).white().bold(),
        count(v.start_step),
        count(v.end_step),
        count(v.problems).bright_yellow(),
        v.strategy.as_deref().unwrap_or("none").bright_black()
    )
}

fn format_reactive_division(v: &EventVisitor) -> String {
    let kind = if v.interrupting.unwrap_or(false) {
        "interrupting".bright_red().to_string()
    } else {
        "continuous".bright_green().to_string()
    };
    format!(
        "{} {} Reactive division at level {} │ {} │ {}",
        format_elapsed(),
        "✂".bright_magenta(),
        count(v.level).white().bold(),
        v.point.as_deref().unwrap_or(""),
        kind
    )
}

fn format_sgoal_achieved(v: &EventVisitor) -> String {
    format!(
        "{} {} Level {} stage {} achieved at step {} │ {}/{}",
        format_elapsed(),
        "✓".bright_green(),
        count(v.level).white(),
        count(v.index).bright_yellow(),
        count(v.step).white(),
        count(v.achieved),
        count(v.total)
    )
}

fn format_search_increment(v: &EventVisitor, level: Level) -> String {
    if level != Level::TRACE {
        return String::new();
    }
    format!(
        "{} {} Level {} │ step {:>6} │ {} │ {}",
        format_elapsed(),
        "·".bright_black(),
        count(v.level).bright_black(),
        count(v.end_step).bright_black(),
        format_seconds(v.time.unwrap_or(0.0)).bright_black(),
        v.result.as_deref().unwrap_or("Unknown").bright_black()
    )
}

fn format_clamping(v: &EventVisitor) -> String {
    format!(
        "{} {} Level {} │ {} │ {} -> {}",
        format_elapsed(),
        "!".yellow().bold(),
        count(v.level).white(),
        v.message.as_deref().unwrap_or("clamped").yellow(),
        count(v.requested),
        count(v.clamped)
    )
}

fn format_seconds(seconds: f64) -> String {
    let ms = (seconds * 1000.0).round() as u64;
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", seconds)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0123), "12ms");
        assert_eq!(format_seconds(2.5), "2.50s");
        assert_eq!(format_seconds(125.0), "2m 5s");
    }

    #[test]
    fn test_unknown_events_are_silent() {
        let visitor = EventVisitor {
            event: Some("grounding_saved".to_string()),
            ..EventVisitor::default()
        };
        assert!(format_event(&visitor, Level::DEBUG).is_empty());
    }

    #[test]
    fn test_search_increments_only_at_trace() {
        let visitor = EventVisitor {
            event: Some("search_increment".to_string()),
            level: Some(1),
            end_step: Some(12),
            ..EventVisitor::default()
        };
        assert!(format_event(&visitor, Level::DEBUG).is_empty());
        assert!(format_event(&visitor, Level::TRACE).contains("12"));
    }

    #[test]
    fn test_hierarchical_end_groups_numbers() {
        let visitor = EventVisitor {
            event: Some("hierarchical_end".to_string()),
            increments: Some(3),
            plan_length: Some(12_500),
            total_actions: Some(1_024),
            time: Some(1.5),
            ..EventVisitor::default()
        };
        let output = format_event(&visitor, Level::INFO);
        assert!(output.contains("12,500"));
        assert!(output.contains("1,024"));
    }
}
