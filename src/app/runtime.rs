use super::*;
use ratatui::layout::Rect;

use crate::client::langgraph_factory;

pub(crate) fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    deployment: Deployment,
    session: Session,
    theme: ThemePreset,
) -> Result<()> {
    let mut app = App::new(deployment, session, theme, langgraph_factory());
    const ACTIVE_POLL_MS: u64 = 33;
    const IDLE_POLL_MS: u64 = 100;
    const SPINNER_TICK_MS: u64 = 120;
    const MAX_EVENTS_PER_FRAME: u16 = 64;
    let mut last_spinner_tick = Instant::now();
    let mut needs_draw = true;

    loop {
        if app.poll_worker() {
            needs_draw = true;
        }
        if (app.is_running() || app.sync.loading)
            && last_spinner_tick.elapsed() >= Duration::from_millis(SPINNER_TICK_MS)
        {
            app.spinner_idx = app.spinner_idx.wrapping_add(1);
            last_spinner_tick = Instant::now();
            if app.is_running() {
                app.follow_scroll();
            }
            needs_draw = true;
        }

        if needs_draw {
            let size = terminal.size().context("terminal size")?;
            let (width, height) =
                ui::transcript_viewport(&app, Rect::new(0, 0, size.width, size.height));
            app.update_viewport(width, height);
            app.ensure_render_cache();
            terminal.draw(|f| ui::draw(f, &app)).context("draw frame")?;
            needs_draw = false;
        }

        if app.should_quit {
            break;
        }

        let timeout = if app.is_running() {
            Duration::from_millis(ACTIVE_POLL_MS)
        } else {
            Duration::from_millis(IDLE_POLL_MS)
        };
        if !event::poll(timeout).context("event poll")? {
            continue;
        }

        let mut wheel_delta: i32 = 0;
        let mut drained_events: u16 = 0;

        loop {
            match event::read().context("event read")? {
                Event::Key(key) => {
                    if !matches!(key.kind, KeyEventKind::Release) {
                        app.handle_key(key);
                        needs_draw = true;
                    }
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => wheel_delta -= 1,
                    MouseEventKind::ScrollDown => wheel_delta += 1,
                    _ => {}
                },
                Event::Paste(text) => {
                    app.handle_paste_event(&text);
                    needs_draw = true;
                }
                Event::Resize(_, _) => {
                    needs_draw = true;
                }
                _ => {}
            }

            drained_events = drained_events.saturating_add(1);
            if drained_events >= MAX_EVENTS_PER_FRAME {
                break;
            }
            if !event::poll(Duration::from_millis(0)).context("event poll drain")? {
                break;
            }
        }

        if wheel_delta < 0 {
            app.scroll_up(wheel_delta.unsigned_abs().min(64) as u16);
            needs_draw = true;
        } else if wheel_delta > 0 {
            app.scroll_down(wheel_delta.min(64) as u16);
            needs_draw = true;
        }
    }

    tracing::info!("exiting");
    Ok(())
}
