//! Terminal front end. Rendering and key handling run on the async runtime, key presses and
//! ticker pulses are both awaited in one loop so the engine only ever sees one action at a time.

pub mod app;
pub mod view;

use std::io;

use anyhow::Result;
use app::{App, Flow};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use crate::{
    engine::{ticker::Tick, TimerEngine},
    storage::project_store::ProjectStore,
};

/// Runs the interactive ui until the user quits or `shutdown` is cancelled. `shutdown` is
/// cancelled on the way out, so tasks running next to the ui stop as well.
pub async fn run_tui<S: ProjectStore>(
    engine: &mut TimerEngine<S>,
    ticks: mpsc::Receiver<Tick>,
    shutdown: CancellationToken,
) -> Result<()> {
    let result = run_terminal(engine, ticks, &shutdown).await;
    shutdown.cancel();
    result
}

/// The terminal is restored even when the loop fails.
async fn run_terminal<S: ProjectStore>(
    engine: &mut TimerEngine<S>,
    ticks: mpsc::Receiver<Tick>,
    shutdown: &CancellationToken,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, engine, ticks, shutdown).await;

    let restored = [
        disable_raw_mode(),
        execute!(terminal.backend_mut(), LeaveAlternateScreen),
        terminal.show_cursor(),
    ];
    first_failure(result, restored)
}

/// Every restore step has already run. The loop's own error wins over restore errors, which
/// are logged either way.
fn first_failure(
    result: Result<()>,
    restored: impl IntoIterator<Item = io::Result<()>>,
) -> Result<()> {
    let mut first = None;
    for step in restored {
        if let Err(e) = step {
            error!("Failed to restore the terminal {e:?}");
            first.get_or_insert(e);
        }
    }
    result?;
    first.map_or(Ok(()), |e| Err(e.into()))
}

async fn run_event_loop<S: ProjectStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &mut TimerEngine<S>,
    mut ticks: mpsc::Receiver<Tick>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let mut app = App::default();
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| view::draw(frame, &app, engine))?;

        select! {
            _ = shutdown.cancelled() => {
                info!("Leaving ui on shutdown request");
                return Ok(());
            }
            tick = ticks.recv() => match tick {
                Some(tick) => {
                    trace!("Refreshing on {tick:?}");
                    engine.advance_display();
                }
                None => {
                    info!("Ticker is gone, leaving ui");
                    return Ok(());
                }
            },
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(engine, key) == Flow::Quit {
                        info!("Quit requested");
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        }
    }
}
