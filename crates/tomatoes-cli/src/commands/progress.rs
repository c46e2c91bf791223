use tomatoes_core::render_slots;

use crate::app::{print_event, App, CliResult};

pub fn run(json: bool) -> CliResult {
    let app = App::open()?;
    let per_row = app.config.display.slots_per_row as usize;

    app.with_session(|session, events| {
        for event in &events {
            tracing::debug!(?event, "progress");
        }
        if json {
            print_event(&session.snapshot()?)?;
        } else {
            println!("{}", render_slots(&session.progress(), per_row));
            println!(
                "{}/{} today",
                session.completed_units(),
                session.config().total_units
            );
        }
        Ok(())
    })
}
