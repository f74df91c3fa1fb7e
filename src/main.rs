use std::io::{self, BufRead, Write};

use taxcalc::store::JsonFileStore;
use taxcalc::{Calculator, Config, TaxMode, TaxSettings};

fn print_state(calc: &Calculator) {
    if let Some(error) = calc.error() {
        match &error.details {
            Some(d) => println!("! {}  [{}>>{}<<{}]", error.message, d.pre, d.highlight, d.post),
            None => println!("! {}", error.message),
        }
        if let Some(suggestion) = calc.suggestion() {
            match &suggestion.fix {
                Some(fix) => println!("  {} ('fix' to use: {})", suggestion.message, fix),
                None => println!("  {}", suggestion.message),
            }
        }
        return;
    }

    println!("{}", calc.buffer());
    if calc.is_executed() {
        if let Some(outcome) = calc.last_outcome() {
            if let (Some(value), Some(label)) = (&outcome.tax_result, &outcome.tax_label) {
                println!("  with tax: {} {}", value, label);
            }
        }
    } else if let Some(preview) = calc.live_preview() {
        if preview != calc.buffer() {
            println!("  = {}", preview);
        }
    }
}

fn print_history(calc: &Calculator) {
    if calc.history().is_empty() {
        println!("(no history)");
        return;
    }
    for item in calc.history() {
        print!("[{}] {} {}  {} = {}", item.id, item.date, item.time, item.expression, item.result);
        if let Some(tax) = &item.tax_result {
            print!("  ({} {})", tax, item.tax_label.as_deref().unwrap_or(""));
        }
        if !item.notes.is_empty() {
            print!("  # {}", item.notes);
        }
        println!();
    }
    println!("{} today", calc.entry_count_today());
}

const TAX_USAGE: &str = "usage: tax off | tax <add-15|divide-93|custom|extract-custom> [rate]";

/// Settings for a `tax ...` command, or the message to show instead.
fn parse_tax(current: &TaxSettings, args: &[&str]) -> Result<TaxSettings, String> {
    let mut settings = current.clone();
    match args {
        ["off"] => settings.is_enabled = false,
        [mode] | [mode, _] => {
            let Some(mode) = TaxMode::parse(mode) else {
                return Err(format!("unknown tax mode '{}'", mode));
            };
            settings.is_enabled = true;
            settings.mode = mode;
            if let [_, rate] = args {
                settings.rate = rate
                    .parse::<f64>()
                    .ok()
                    .filter(|r| r.is_finite())
                    .ok_or_else(|| TAX_USAGE.to_string())?;
            }
        }
        _ => return Err(TAX_USAGE.to_string()),
    }
    Ok(settings)
}

fn set_tax(calc: &mut Calculator, args: &[&str]) {
    if args.is_empty() {
        print_tax(calc.tax_settings());
        return;
    }
    match parse_tax(calc.tax_settings(), args) {
        Ok(settings) => {
            calc.set_tax_settings(settings);
            print_tax(calc.tax_settings());
        }
        Err(message) => println!("{}", message),
    }
}

fn print_tax(settings: &TaxSettings) {
    if settings.is_enabled {
        println!("tax: {}", settings.mode.describe(settings.rate));
    } else {
        println!("tax: off");
    }
}

/// Returns false when the session should end.
fn dispatch(calc: &mut Calculator, line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, args)) = words.split_first() else {
        return true;
    };
    let id_arg = || args.first().and_then(|a| a.parse::<i64>().ok());

    match command {
        "quit" | "exit" => return false,
        "=" => calc.calculate(),
        "back" => calc.backspace(),
        "sign" => calc.toggle_sign(),
        "paren" | "()" => calc.handle_parenthesis(),
        "ans" => calc.append_answer(),
        "fix" => calc.apply_fix(),
        "ac" => calc.clear_all(),
        "set" => calc.update_input(line.trim_start().trim_start_matches("set")),
        "history" => {
            print_history(calc);
            return true;
        }
        "clear-history" => calc.clear_history(),
        "del" => match id_arg() {
            Some(id) if calc.delete_history_item(id) => println!("deleted {}", id),
            _ => println!("no such item"),
        },
        "note" => match id_arg() {
            Some(id) if calc.update_note(id, &args[1..].join(" ")) => println!("noted"),
            _ => println!("no such item"),
        },
        "load" => match id_arg() {
            Some(id) if calc.load_from_history(id) => {}
            _ => println!("no such item"),
        },
        "tax" => {
            set_tax(calc, args);
            return true;
        }
        "max" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
            Some(n) => {
                calc.set_max_history(n);
                println!("keeping {} entries", calc.max_history());
                return true;
            }
            None => println!("usage: max <n>"),
        },
        _ => {
            for key in &words {
                calc.append(key);
            }
        }
    }

    print_state(calc);
    true
}

fn main() {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        Config::default()
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str())).init();

    let store = JsonFileStore::open(config.data_file());
    log::debug!("using store {}", store.path().display());

    let mut calc = Calculator::restore(
        Box::new(store),
        Box::new(|message: &str| println!("* {}", message)),
        &config.calculator,
    );

    print_state(&calc);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("could not read input: {}", e);
                break;
            }
        };
        if !dispatch(&mut calc, &line) {
            break;
        }
        if let Err(e) = stdout.flush() {
            log::warn!("could not flush output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_15() -> TaxSettings {
        TaxSettings {
            is_enabled: true,
            mode: TaxMode::Custom,
            rate: 15.0,
            show_tax_per_number: false,
        }
    }

    #[test]
    fn test_tax_command_sets_mode_and_rate() {
        let settings = parse_tax(&TaxSettings::default(), &["extract-custom", "7.5"]).unwrap();
        assert!(settings.is_enabled);
        assert_eq!(settings.mode, TaxMode::ExtractCustom);
        assert_eq!(settings.rate, 7.5);

        let settings = parse_tax(&custom_15(), &["divide-93"]).unwrap();
        assert_eq!(settings.mode, TaxMode::Divide93);
        assert_eq!(settings.rate, 15.0);

        assert!(!parse_tax(&custom_15(), &["off"]).unwrap().is_enabled);
    }

    #[test]
    fn test_tax_command_rejects_bad_rate() {
        assert_eq!(parse_tax(&custom_15(), &["custom", "abc"]), Err(TAX_USAGE.to_string()));
        assert_eq!(parse_tax(&custom_15(), &["custom", "inf"]), Err(TAX_USAGE.to_string()));
        assert_eq!(parse_tax(&custom_15(), &["custom", "5", "6"]), Err(TAX_USAGE.to_string()));
        assert_eq!(
            parse_tax(&custom_15(), &["vat"]),
            Err("unknown tax mode 'vat'".to_string())
        );
    }
}
