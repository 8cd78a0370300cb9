use anyhow::Result;

use waqt::parser::offset::shift_time;
use waqt::parser::offset_fix;

/// Print the DST hour offset between a timetable and a reference Maghrib
pub fn offset(source: String, reference: String, times: Vec<String>) -> Result<()> {
    let offset = offset_fix(&source, &reference);

    println!("Source Maghrib:    {source}");
    println!("Reference Maghrib: {reference}");
    println!("Offset:            {offset:+} h");

    if !times.is_empty() {
        println!();
        for time in &times {
            match shift_time(time, offset) {
                Some(shifted) => println!("  {time} -> {shifted}"),
                None => println!("  {time} -> (invalid)"),
            }
        }
    }

    Ok(())
}
