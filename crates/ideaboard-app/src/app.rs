use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use ideaboard_backend::Backend;
use ideaboard_data::DataClient;

use crate::command::{Command, HELP};
use crate::page::{IdeasPage, Level};

/// Drive the ideas page from line-oriented `input`, drawing to `output`.
///
/// Shows the loading indicator until the first list fetch settles, then
/// redraws after every command, every mutation outcome, and every new state
/// of the watched list. Returns on `quit` or end of input, once mutations
/// still in flight have reported back.
pub async fn run<B, R, W>(client: DataClient<B>, input: R, mut output: W) -> Result<()>
where
    B: Backend,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let ideas = client.ideas();
    let mut watched = ideas.watch_list();
    let (outcomes_tx, mut outcomes) = mpsc::unbounded_channel();
    let mut page = IdeasPage::new(ideas, outcomes_tx);
    let mut lines = input.lines();

    draw(&mut output, &page).await?;
    page.apply(watched.settled().await);
    draw(&mut output, &page).await?;

    loop {
        tokio::select! {
            changed = watched.changed() => {
                if !changed {
                    break;
                }
                page.apply(watched.state());
            }
            Some(outcome) = outcomes.recv() => page.finish(outcome),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("input closed");
                    break;
                };
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(Command::Help) => {
                        output.write_all(HELP.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                        continue;
                    }
                    Ok(Command::Refresh) => watched.refetch().await,
                    Ok(command) => page.dispatch(command),
                    Err(e) => page.notify(Level::Error, e.to_string()),
                }
            }
        }
        draw(&mut output, &page).await?;
    }

    if page.in_flight() > 0 {
        info!(in_flight = page.in_flight(), "waiting for pending changes");
        while page.in_flight() > 0 {
            let Some(outcome) = outcomes.recv().await else {
                break;
            };
            page.finish(outcome);
        }
        draw(&mut output, &page).await?;
    }

    Ok(())
}

async fn draw<B: Backend, W: AsyncWrite + Unpin>(output: &mut W, page: &IdeasPage<B>) -> Result<()> {
    output.write_all(page.render().as_bytes()).await?;
    output.write_all(b"> ").await?;
    output.flush().await?;
    Ok(())
}
