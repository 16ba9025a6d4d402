use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use knitlink_proto::{Decoded, MessageKind};
use knitlink_session::{Session, SessionError};
use tracing::info;

use crate::cmd::{Context, MonitorArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, print_stats};

pub fn run(args: MonitorArgs, ctx: &Context) -> CliResult<i32> {
    let mut session = ctx.open_session()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.request_state {
        session
            .request_state()
            .map_err(|err| session_error("send failed", err))?;
    }

    let filter = Filter {
        kinds: args.kinds,
        count: args.count,
    };
    let idle = Duration::from_millis(args.idle_ms);
    let printed = dispatch(&mut session, &filter, idle, &running, |decoded| {
        print_message(decoded, ctx.format)
    })
    .map_err(|err| session_error("receive failed", err))?;

    let stats = session.stats();
    info!(
        printed,
        rejected = stats.rejected,
        checksum_failures = stats.checksum_failures,
        frame_anomalies = stats.frame_anomalies,
        "monitor stopped"
    );
    if args.stats {
        print_stats(&stats, ctx.format);
    }
    Ok(SUCCESS)
}

struct Filter {
    kinds: Option<Vec<MessageKind>>,
    count: Option<usize>,
}

impl Filter {
    fn accepts(&self, decoded: &Decoded) -> bool {
        match (&self.kinds, decoded.kind()) {
            (None, _) => true,
            (Some(kinds), Some(kind)) => kinds.contains(&kind),
            (Some(_), None) => false,
        }
    }
}

/// Poll until `running` clears or the count is reached, handing each
/// accepted message to `sink`. Returns how many were handed over.
///
/// Rejected payloads, checksum failures and frame anomalies are logged by
/// the session and never end the loop; only transport errors do.
fn dispatch<F>(
    session: &mut Session,
    filter: &Filter,
    idle: Duration,
    running: &AtomicBool,
    mut sink: F,
) -> Result<usize, SessionError>
where
    F: FnMut(&Decoded),
{
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        if filter.count.is_some_and(|count| printed >= count) {
            break;
        }

        let Some(decoded) = session.poll_next_message()? else {
            if !session.is_open() {
                break;
            }
            std::thread::sleep(idle);
            continue;
        };

        if !filter.accepts(&decoded) {
            continue;
        }
        sink(&decoded);
        printed = printed.saturating_add(1);
    }

    Ok(printed)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
