use std::io::Write;

use cambusa_core::{Application, Route};
use colored::{ColoredString, Colorize};

/// `cambusa routes:list`
pub fn run(app: &Application) -> Result<(), crate::error::CommandError> {
    let routes = app.routes();
    if routes.is_empty() {
        println!("{}", "No routes found.".dimmed());
        return Ok(());
    }

    println!("{}", "Registered routes:".bold());
    for route in routes {
        println!("{:<8} {}", colored_method(&route.method), route.path);
    }
    println!();
    println!("{} routes total", routes.len());
    Ok(())
}

/// Plain `METHOD path` listing, as printed by the REPL `routes` built-in.
pub fn write_routes<W: Write>(out: &mut W, routes: &[Route]) -> std::io::Result<()> {
    writeln!(out, "Registered routes:")?;
    for route in routes {
        writeln!(out, "{} {}", route.method, route.path)?;
    }
    Ok(())
}

fn colored_method(method: &str) -> ColoredString {
    match method {
        "GET" => method.green(),
        "POST" => method.blue(),
        "PUT" => method.yellow(),
        "DELETE" => method.red(),
        "PATCH" => method.magenta(),
        _ => method.normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_routes_in_declaration_order() {
        let routes = vec![Route::new("get", "/users"), Route::new("POST", "/users")];
        let mut out = Vec::new();
        write_routes(&mut out, &routes).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Registered routes:\nGET /users\nPOST /users\n"
        );
    }
}
