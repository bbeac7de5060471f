//! Status display utilities for the command-line.

use colored::*;

use crate::protocol::MachineStatus;

/// The description and progress (if any) to show for a [`MachineStatus`].
pub fn describe(status: MachineStatus) -> (String, Option<usize>) {
    match status {
        MachineStatus::Ready => ("Ready".to_owned(), None),
        MachineStatus::StandBy => ("Standby".to_owned(), None),
        MachineStatus::TurningOn(percent) => ("Turning on...".to_owned(), Some(percent)),
        MachineStatus::ShuttingDown(percent) => ("Shutting down...".to_owned(), Some(percent)),
        MachineStatus::Busy(percent) => ("Dispensing...".to_owned(), Some(percent)),
        MachineStatus::Cleaning(percent) => ("Cleaning...".to_owned(), Some(percent)),
        MachineStatus::Descaling => ("Descaling".to_owned(), None),
        MachineStatus::Alarm(alarm) => (format!("Alarm: {:?}", alarm), None),
    }
}

/// Renders a description followed by a `[###===]` progress bar, padded to `width`.
pub fn make_bar(s: &str, width: usize, percent: Option<usize>) -> String {
    let mut s = s.to_owned();
    if let Some(percent) = percent {
        let percent = percent.clamp(0, 100);
        s += " [";
        let remaining = width.saturating_sub(s.len() + 1);
        let count = (remaining * percent) / 100;
        s += &"#".repeat(count);
        s += &"=".repeat(remaining - count);
        s += "]";
        s
    } else {
        // No bar, just pad w/spaces
        let pad = width.saturating_sub(s.len());
        s + &" ".repeat(pad)
    }
}

/// A single status line, coloured by severity when `colour` is set.
pub fn render(status: MachineStatus, width: usize, colour: bool) -> String {
    let (description, percent) = describe(status);
    let bar = make_bar(&description, width, percent);
    if !colour {
        return bar;
    }
    match status {
        MachineStatus::Ready => bar.green().to_string(),
        MachineStatus::StandBy => bar.dimmed().to_string(),
        MachineStatus::Alarm(..) => bar.red().bold().to_string(),
        _ => bar.truecolor(183, 161, 129).on_truecolor(92, 69, 6).to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::MachineAlarm;

    #[test]
    fn format_no_progress() {
        let none: Option<usize> = None;
        let test_cases = [
            // 123456789012345678901234567890123456789
            (
                "Description                             ",
                ("Description", none),
            ),
            (
                "Description [######====================]",
                ("Description", Some(25)),
            ),
            (
                "Description [#############=============]",
                ("Description", Some(50)),
            ),
            (
                "Description [##########################]",
                ("Description", Some(100)),
            ),
        ];

        for (expected, (description, progress)) in test_cases.into_iter() {
            assert_eq!(expected, make_bar(description, 40, progress));
        }
    }

    #[test]
    fn plain_render() {
        assert_eq!(render(MachineStatus::Ready, 10, false), "Ready     ");
        assert_eq!(
            render(MachineStatus::Alarm(MachineAlarm::EmptyWaterTank.into()), 10, false),
            "Alarm: EmptyWaterTank"
        );
        assert!(render(MachineStatus::Busy(50), 30, false).starts_with("Dispensing... [#"));
    }
}
