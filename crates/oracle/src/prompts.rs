use chrono::NaiveDate;
use flightdesk_core::CITY_CODES;

pub fn classification_prompt(user_text: &str) -> String {
    format!(
        "Classify intent as ONE of:\n\
         - SEARCH_FLIGHTS\n\
         - GENERAL_CHAT\n\n\
         User message:\n\"{user_text}\"\n\n\
         Respond with ONLY the label."
    )
}

pub fn extraction_prompt(user_text: &str, today: NaiveDate) -> String {
    format!(
        "Extract flight search parameters.\n\n\
         CITY -> IATA:\n{table}\n\n\
         Return JSON ONLY:\n\
         {{\n  \"origin\": \"XXX\",\n  \"destination\": \"YYY\",\n  \"departDate\": \"YYYY-MM-DD\",\n  \
         \"tripType\": \"ONEWAY\",\n  \"adults\": 1,\n  \"cabin\": \"ECONOMY\"\n}}\n\n\
         Today is {today}\n\n\
         User message:\n\"{user_text}\"",
        table = city_table(),
        today = today.format("%Y-%m-%d"),
    )
}

pub fn chat_prompt(user_text: &str) -> String {
    format!(
        "You are a FLIGHT BOOKING ASSISTANT.\n\n\
         Rules:\n\
         - Do NOT roleplay\n\
         - Do NOT invent prices or airlines\n\
         - Keep responses short\n\
         - Guide user to search or booking\n\n\
         User message:\n\"{user_text}\""
    )
}

/// One line per code, aliases joined: `Mumbai/Bombay -> BOM`.
fn city_table() -> String {
    let mut lines: Vec<(String, &str)> = Vec::new();
    for (city, code) in CITY_CODES {
        let name = title_case(city);
        match lines.iter_mut().find(|(_, existing)| existing == code) {
            Some((names, _)) => {
                names.push('/');
                names.push_str(&name);
            }
            None => lines.push((name, *code)),
        }
    }

    lines
        .into_iter()
        .map(|(names, code)| format!("{names} -> {code}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
