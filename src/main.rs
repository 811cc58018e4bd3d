//! Drill Sim entry point
//!
//! Native builds run every drill with the scripted player and print the
//! score records plus the resulting leaderboard. The browser build enters
//! through `platform::web` instead.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::cell::RefCell;
    use std::rc::Rc;

    use drill_sim::autoplay::{Bot, play};
    use drill_sim::{DrillKind, HighScores, Session, SessionConfig};

    env_logger::init();
    log::info!("Drill Sim (native) starting...");

    let mut args = std::env::args().skip(1);
    let tier = args.next().unwrap_or_else(|| "medium".to_string());
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(7);
    let config = SessionConfig {
        difficulty_tier: tier,
        seed: Some(seed),
        ..SessionConfig::default()
    };

    let board = Rc::new(RefCell::new(HighScores::new()));
    for kind in DrillKind::ALL {
        let session = match Session::from_config(kind, &config) {
            Ok(session) => session,
            Err(err) => {
                eprintln!("{kind}: {err}");
                std::process::exit(2);
            }
        };
        let mut session = session.with_submitter(Rc::clone(&board));
        let mut bot = Bot::for_session(&session, seed);
        match play(&mut session, &mut bot, 300_000) {
            Some(record) => match record.to_json() {
                Ok(json) => println!("{json}"),
                Err(err) => log::error!("{kind}: could not encode record: {err}"),
            },
            None => log::warn!("{kind}: did not finish"),
        }
    }

    println!("\nLeaderboard");
    for kind in DrillKind::ALL {
        let board = board.borrow();
        let entries = board.entries_for(kind.widget_id());
        if let Some(best) = entries.first() {
            println!("  {:<18} {:>6}", kind.widget_id(), best.score);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Entry point is `platform::web::init`
}
