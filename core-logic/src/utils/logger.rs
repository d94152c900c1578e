use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{EnvFilter, Targets},
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used for the one-line summary of every batch attempt.
pub const BATCH_RESULT_TARGET: &str = "batch_result";

/// Installs the global subscriber: hourly-rolling file log under `log_dir`
/// plus a colored console. The returned guard must be kept alive.
pub fn setup_logger(log_dir: &str) -> WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::hourly(log_dir, "distributor");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = Targets::new()
        .with_target(BATCH_RESULT_TARGET, tracing::Level::INFO)
        .with_default(tracing::Level::DEBUG);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    // RUST_LOG overrides the console level; INFO otherwise.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn event_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);
    visitor.message
}

/// Paints the outcome keywords of batch lines.
fn colorize_outcome(msg: &str) -> String {
    let green = Style::new().fg(Color::LightGreen).bold();
    let yellow = Style::new().fg(Color::Yellow).bold();
    let red = Style::new().fg(Color::LightRed).bold();

    msg.replace("SUCCESS", &green.paint("SUCCESS").to_string())
        .replace("REVERTED", &yellow.paint("REVERTED").to_string())
        .replace("FAILED", &red.paint("FAILED").to_string())
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let msg = event_message(event);
        let level = *event.metadata().level();

        if level == tracing::Level::ERROR {
            let red = Style::new().fg(Color::LightRed);
            writeln!(writer, "{}", red.paint(msg))
        } else if level == tracing::Level::WARN {
            let yellow = Style::new().fg(Color::Yellow);
            writeln!(writer, "{}", yellow.paint(msg))
        } else {
            writeln!(writer, "{}", colorize_outcome(&msg))
        }
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let meta = event.metadata();

        write!(writer, "{} [{}] {}: ", timestamp, meta.level(), meta.target())?;
        writeln!(writer, "{}", event_message(event))
    }
}
