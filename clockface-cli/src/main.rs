use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use clockface_core::api::models::{Employee, HistoryRange, NewEmployee, OfficeSettings};
use clockface_core::api::{AttendanceKind, HttpTransport};
use clockface_core::app::attendance_message;
use clockface_core::capture::{CaptureFlow, CaptureSettings, CapturedImage, V4lCamera, VideoSource};
use clockface_core::clock::Ticker;
use clockface_core::config::Config;
use clockface_core::geo::{Coordinates, FixedLocator, Locator, UnavailableLocator};
use clockface_core::route::{guard, Access, Route};
use clockface_core::session::FileSessionStore;
use clockface_core::views::dashboard::{activity_rows, stat_cards};
use clockface_core::views::employee::EmployeeForm;
use clockface_core::views::records::RecordRow;
use clockface_core::views::settings::{
    apply_location, find_group_id, office_geofence, require_bot_token, SettingsEdit,
};
use clockface_core::views::format_long_date;
use clockface_core::App;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

type ClockfaceApp = App<HttpTransport, FileSessionStore>;

#[derive(Parser)]
#[command(name = "clockface")]
#[command(about = "Face-recognition attendance client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: Option<String>,
        /// Log in through this path instead of the configured one
        #[arg(long)]
        admin_path: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Today's status and this month's counters
    Home {
        #[arg(short, long, default_value = "month")]
        range: HistoryRange,
    },
    /// Capture a face and check in (or out)
    Scan {
        /// Check out instead of checking in
        #[arg(long)]
        checkout: bool,
        /// Use an image file instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
        /// Current latitude, overriding [location] in the config
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Send the first capture without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Attendance history
    Records {
        #[arg(short, long, default_value = "week")]
        range: HistoryRange,
    },
    /// Live office clock
    Clock {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Top performers and recent activity
    Dashboard,
    /// Top performer cards
    Top,
    /// Attendance across all employees
    Attendance,
    /// Manage employees
    Employees {
        #[command(subcommand)]
        action: EmployeeAction,
    },
    /// Register a new employee with their face
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        employee_id: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        admin: bool,
        /// Use an image file instead of the camera
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Office and notification settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Show configuration
    Config {
        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },
    /// Show where a path leads for the current session
    Route { path: String },
}

#[derive(Subcommand)]
enum EmployeeAction {
    /// Employees as seen by administrators
    List,
    /// The employee directory
    All,
    /// Delete an employee
    Delete {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        #[arg(long)]
        radius: Option<f64>,
        /// Empty string clears the token
        #[arg(long)]
        bot_token: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        group_id: Option<String>,
    },
    /// Use this device's position as the office location
    Locate {
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    /// Look up the Telegram group id from the bot's latest update
    TelegramGroup {
        #[arg(long)]
        bot_token: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    match cli.command {
        Commands::Login { email, admin_path } => cmd_login(email, admin_path),
        Commands::Logout => cmd_logout(),
        Commands::Home { range } => cmd_home(range),
        Commands::Scan {
            checkout,
            image,
            lat,
            lon,
            yes,
        } => cmd_scan(checkout, image, coordinates(lat, lon), yes),
        Commands::Records { range } => cmd_records(range),
        Commands::Clock { ticks } => cmd_clock(ticks),
        Commands::Dashboard => cmd_dashboard(),
        Commands::Top => cmd_top(),
        Commands::Attendance => cmd_attendance(),
        Commands::Employees { action } => cmd_employees(action),
        Commands::Register {
            first_name,
            last_name,
            email,
            employee_id,
            password,
            admin,
            image,
            yes,
        } => {
            let form = EmployeeForm {
                first_name,
                last_name,
                email,
                employee_id,
                password: String::new(),
                is_admin: admin,
                image: None,
            };
            cmd_register(form, password, image, yes)
        }
        Commands::Settings { action } => cmd_settings(action),
        Commands::Config { validate } => cmd_config(validate),
        Commands::Route { path } => cmd_route(path),
    }
}

fn load_app() -> anyhow::Result<ClockfaceApp> {
    let config = Config::load()?;
    Ok(App::from_config(config)?)
}

fn coordinates(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    Some(Coordinates {
        latitude: lat?,
        longitude: lon?,
    })
}

/// Flags first, then [location] from the config
fn locator(config: &Config, position: Option<Coordinates>) -> Box<dyn Locator> {
    match position.or_else(|| config.location.coordinates()) {
        Some(position) => Box::new(FixedLocator(position)),
        None => Box::new(UnavailableLocator),
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Load the face from a file, or run the camera until the user keeps a shot.
fn capture_face(config: &Config, image: Option<PathBuf>, yes: bool) -> anyhow::Result<CapturedImage> {
    if let Some(path) = image {
        return CapturedImage::from_file(
            &path,
            config.camera.upload_max_width,
            config.camera.jpeg_quality,
        )
        .with_context(|| format!("Failed to load {}", path.display()));
    }

    let camera = V4lCamera::new(&config.camera);
    let mut flow = CaptureFlow::new(camera, CaptureSettings::from(&config.camera));
    flow.start()?;

    loop {
        println!("Look at the camera...");
        thread::sleep(Duration::from_secs(1));
        let image = grab_frame(&mut flow)?;
        println!("📷 Captured ({} bytes)", image.len());

        if yes {
            return Ok(image);
        }
        let answer = prompt("Use this photo? [Y]es / [r]etake / [c]ancel: ")?;
        match answer.to_lowercase().as_str() {
            "" | "y" | "yes" => return Ok(image),
            "r" | "retake" => flow.retake()?,
            _ => {
                flow.cancel();
                bail!("Capture cancelled");
            }
        }
    }
}

fn grab_frame<S: VideoSource>(flow: &mut CaptureFlow<S>) -> anyhow::Result<CapturedImage> {
    for _ in 0..10 {
        if let Some(image) = flow.capture()? {
            return Ok(image);
        }
        thread::sleep(Duration::from_millis(100));
    }
    bail!("Camera did not produce a frame")
}

fn cmd_login(email: Option<String>, admin_path: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(path) = admin_path {
        config.api.login_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
    }
    let app = App::from_config(config)?;

    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let session = app.login(&email, &password)?;
    println!("✓ Logged in");
    let home = if session.is_admin {
        Route::Dashboard
    } else {
        Route::Home
    };
    println!("Start at: {}", home);
    Ok(())
}

fn cmd_logout() -> anyhow::Result<()> {
    load_app()?.logout()?;
    println!("✓ Logged out");
    Ok(())
}

fn cmd_home(range: HistoryRange) -> anyhow::Result<()> {
    let app = load_app()?;
    let summary = app.home_summary(range)?;
    let now = app.office_now()?;

    println!("Hello, {}", summary.employee_name);
    println!("{}", format_long_date(now));
    println!();
    println!(
        "Status:    {}",
        if summary.is_clocked_in {
            "Clocked in"
        } else {
            "Not clocked in"
        }
    );
    println!("Arrival:   {}", summary.time_status);
    println!("Check in:  {}", summary.check_in_time);
    println!("Check out: {}", summary.check_out_time);
    println!();
    println!("This month:");
    println!("  Present: {}", summary.stats.present);
    println!("  Late:    {}", summary.stats.late);
    println!("  Early:   {}", summary.stats.early);
    Ok(())
}

fn cmd_scan(
    checkout: bool,
    image: Option<PathBuf>,
    position: Option<Coordinates>,
    yes: bool,
) -> anyhow::Result<()> {
    let app = load_app()?;
    app.enter(Route::Scanner)?;

    let kind = if checkout {
        AttendanceKind::CheckOut
    } else {
        AttendanceKind::CheckIn
    };
    println!("{}", kind.label());

    let image = capture_face(app.config(), image, yes)?;

    let device = locator(app.config(), position);
    let fence = app.office_geofence()?;
    if fence.is_none() {
        log::warn!("No office location configured, skipping location check");
    }
    let presence = fence.as_ref().map(|fence| (&*device, fence));

    println!("Verifying...");
    let response = app.mark_attendance(kind, &image, presence)?;
    println!("✓ {}", attendance_message(kind, &response));
    Ok(())
}

fn cmd_records(range: HistoryRange) -> anyhow::Result<()> {
    let app = load_app()?;
    let records = app.records(range)?;

    if records.is_empty() {
        println!("No attendance records ({})", range);
        return Ok(());
    }

    let display = app
        .config()
        .attendance
        .records_rule
        .offset(app.office_offset()?);

    println!(
        "{:<12} {:<4} {:<22} {:<10} {:<10} {:<8} {}",
        "Date", "", "Employee", "Check In", "Check Out", "Status", "State"
    );
    println!("{}", "-".repeat(80));
    for record in &records {
        let row = RecordRow::from_record(record, display);
        println!(
            "{:<12} {:<4} {:<22} {:<10} {:<10} {:<8} {}",
            row.date, row.initials, row.employee, row.check_in, row.check_out, row.time_status, row.state
        );
    }
    Ok(())
}

fn cmd_clock(ticks: Option<u64>) -> anyhow::Result<()> {
    let app = load_app()?;
    let office = app.office_offset()?;

    let ticker = Ticker::start(Duration::from_secs(1), move |tick| {
        let now = Utc::now();
        print!(
            "\r{}  {}",
            format_long_date(now.with_timezone(&office)),
            now.with_timezone(&office).format("%I:%M:%S %p")
        );
        let _ = io::stdout().flush();
        ticks.map_or(true, |limit| tick + 1 < limit)
    });
    ticker.wait();
    println!();
    Ok(())
}

fn print_top(app: &ClockfaceApp) -> anyhow::Result<()> {
    let top = app.authorized(Route::TopPerformers, |client, token| {
        client.top_performers(token)
    })?;

    for card in stat_cards(&top) {
        println!("{}", card.title);
        if card.entries.is_empty() {
            println!("  No data");
        }
        for (i, (name, value)) in card.entries.iter().enumerate() {
            println!("  {}. {:<24} {}", i + 1, name, value);
        }
        println!();
    }
    Ok(())
}

fn print_activity(app: &ClockfaceApp) -> anyhow::Result<()> {
    let history = app.authorized(Route::Attendance, |client, token| {
        client.admin_attendance_history(token)
    })?;
    let rows = activity_rows(&history, app.office_offset()?);

    if rows.is_empty() {
        println!("No attendance recorded");
        return Ok(());
    }

    println!(
        "{:<24} {:<10} {:<11} {:<12} {}",
        "Employee", "ID", "Date", "Check In", "Check Out"
    );
    println!("{}", "-".repeat(72));
    for row in rows {
        println!(
            "{:<24} {:<10} {:<11} {:<12} {}",
            row.employee, row.employee_id, row.date, row.check_in, row.check_out
        );
    }
    Ok(())
}

fn cmd_dashboard() -> anyhow::Result<()> {
    let app = load_app()?;
    app.enter(Route::Dashboard)?;

    print_top(&app)?;
    println!("Recent Activity");
    print_activity(&app)
}

fn cmd_top() -> anyhow::Result<()> {
    print_top(&load_app()?)
}

fn cmd_attendance() -> anyhow::Result<()> {
    print_activity(&load_app()?)
}

fn cmd_employees(action: EmployeeAction) -> anyhow::Result<()> {
    let app = load_app()?;

    match action {
        EmployeeAction::List => {
            let employees = app.authorized(Route::Employees, |client, token| {
                client.admin_employees(token)
            })?;
            print_employees(&employees);
        }
        EmployeeAction::All => {
            let employees =
                app.authorized(Route::Home, |client, token| client.all_employees(token))?;
            print_employees(&employees);
        }
        EmployeeAction::Delete { id, yes } => {
            app.enter(Route::Employees)?;
            if !yes && !confirm("Are you sure you want to delete this employee?")? {
                println!("Cancelled");
                return Ok(());
            }
            app.authorized(Route::Employees, |client, token| {
                client.delete_employee(token, &id)
            })?;
            println!("✓ Employee {} deleted", id);
        }
    }
    Ok(())
}

fn print_employees(employees: &[Employee]) {
    if employees.is_empty() {
        println!("No employees found");
        return;
    }

    println!("{:<38} {:<24} {:<30} {:<10} {}", "ID", "Name", "Email", "Emp. ID", "Role");
    println!("{}", "-".repeat(110));
    for employee in employees {
        println!(
            "{:<38} {:<24} {:<30} {:<10} {}",
            employee.id.as_deref().unwrap_or("—"),
            employee.full_name(),
            employee.email,
            employee.employee_id.as_deref().unwrap_or("—"),
            if employee.is_admin.unwrap_or(false) {
                "Admin"
            } else {
                "Employee"
            }
        );
    }
}

fn cmd_register(
    mut form: EmployeeForm,
    password: Option<String>,
    image: Option<PathBuf>,
    yes: bool,
) -> anyhow::Result<()> {
    let app = load_app()?;
    app.enter(Route::Register)?;

    form.password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password for the new employee: ")?,
    };
    form.image = Some(capture_face(app.config(), image, yes)?);

    let payload: NewEmployee = form.into_payload()?;
    let employee = app.authorized(Route::Register, |client, token| {
        client.create_employee(token, &payload)
    })?;

    println!(
        "✓ Employee {} registered (ID: {})",
        employee.full_name(),
        employee.id.as_deref().unwrap_or("—")
    );
    Ok(())
}

fn cmd_settings(action: SettingsAction) -> anyhow::Result<()> {
    let app = load_app()?;
    let mut settings = app.authorized(Route::Settings, |client, token| client.settings(token))?;

    let changed = match action {
        SettingsAction::Show => {
            print_settings(&settings);
            return Ok(());
        }
        SettingsAction::Set {
            lat,
            lon,
            radius,
            bot_token,
            group_id,
        } => {
            let edit = SettingsEdit {
                office_latitude: lat,
                office_longitude: lon,
                office_radius_meters: radius,
                telegram_bot_token: bot_token,
                telegram_group_id: group_id,
            };
            if edit.is_empty() {
                bail!("Nothing to change. Pass at least one of --lat, --lon, --radius, --bot-token, --group-id");
            }
            edit.apply(&mut settings);
            "Settings updated successfully!"
        }
        SettingsAction::Locate { lat, lon } => {
            let position = locator(app.config(), coordinates(lat, lon)).current_position()?;
            apply_location(&mut settings, position);
            println!(
                "Current location retrieved: {:.6}, {:.6}",
                position.latitude, position.longitude
            );
            "Office location updated"
        }
        SettingsAction::TelegramGroup { bot_token } => {
            if let Some(token) = bot_token {
                settings.telegram_bot_token = Some(token);
            }
            let bot_token = require_bot_token(&settings)?.to_string();
            println!("Fetching updates...");
            let updates = app.authorized(Route::Settings, |client, token| {
                client.telegram_updates(token, &bot_token)
            })?;
            let group_id = find_group_id(&updates)?;
            println!("Group ID found: {}", group_id);
            settings.telegram_group_id = Some(group_id);
            "Group ID found and applied!"
        }
    };

    app.authorized(Route::Settings, |client, token| {
        client.update_settings(token, &settings)
    })?;
    println!("✓ {}", changed);
    print_settings(&settings);
    Ok(())
}

fn print_settings(settings: &OfficeSettings) {
    fn show<T: std::fmt::Display>(value: &Option<T>) -> String {
        value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    }

    println!("[office]");
    println!("  latitude = {}", show(&settings.office_latitude));
    println!("  longitude = {}", show(&settings.office_longitude));
    println!("  radius_meters = {}", show(&settings.office_radius_meters));
    match office_geofence(settings) {
        Some(_) => println!("  geofence = active"),
        None => println!("  geofence = incomplete"),
    }
    println!();
    println!("[telegram]");
    println!(
        "  bot_token = {}",
        if settings.telegram_bot_token.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!("  group_id = {}", show(&settings.telegram_group_id));
}

fn cmd_config(validate: bool) -> anyhow::Result<()> {
    let config = Config::load()?;

    if validate {
        config.validate()?;
        println!("✓ Configuration is valid");
        return Ok(());
    }

    println!("Configuration:");
    println!();

    println!("[api]");
    println!("  base_url = {:?}", config.api.base_url);
    println!("  login_path = {:?}", config.api.login_path);
    println!("  timeout = {}s", config.api.timeout_secs);
    println!();

    println!("[camera]");
    println!("  device = {:?}", config.camera.device);
    println!("  resolution = {}x{}", config.camera.width, config.camera.height);
    println!(
        "  capture = {}x{} @ quality {}",
        config.camera.capture_width, config.camera.capture_height, config.camera.jpeg_quality
    );
    println!("  upload_max_width = {}", config.camera.upload_max_width);
    match V4lCamera::list_devices() {
        Ok(devices) if !devices.is_empty() => println!("  available = {}", devices.join(", ")),
        Ok(_) => println!("  available = (none)"),
        Err(e) => log::debug!("Could not list camera devices: {}", e),
    }
    println!();

    let rules = &config.attendance;
    println!("[attendance]");
    println!("  utc_offset_hours = {}", rules.utc_offset_hours);
    println!(
        "  home_rule = late after {:02}:{:02} ({:?} clock)",
        rules.home_rule.cutoff_hour, rules.home_rule.cutoff_minute, rules.home_rule.clock
    );
    println!(
        "  records_rule = late after {:02}:{:02} ({:?} clock)",
        rules.records_rule.cutoff_hour, rules.records_rule.cutoff_minute, rules.records_rule.clock
    );
    println!();

    println!("[office]");
    match config.office.geofence() {
        Some(fence) => println!(
            "  geofence = {:.6}, {:.6} within {}m",
            fence.center.latitude, fence.center.longitude, fence.radius_meters
        ),
        None => println!("  geofence = (from backend settings)"),
    }
    println!();

    println!("[storage]");
    println!("  session_dir = {:?}", config.storage.session_dir);

    Ok(())
}

fn cmd_route(path: String) -> anyhow::Result<()> {
    let app = load_app()?;
    let session = app.session()?;
    let route = Route::from_path(&path);

    match guard(route, session.as_ref()) {
        Access::Allow => println!("{} → {}", path, route),
        Access::Redirect(to) => println!("{} → {} (redirected from {})", path, to, route),
    }
    Ok(())
}
