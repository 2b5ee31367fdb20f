//! store-intake command line
//!
//! Operator entry point over the intake service: bootstrap the first
//! administrator, manage users and materials, drive entries and issues through
//! their approvals, and read the role-filtered views.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use chrono::{Datelike, NaiveDate, Utc};
use store_intake::draft::{
    GateEntryDraft, InwardDraft, InwardItemDraft, InwardItemUpdate, InwardUpdate, IssueDraft,
    MaterialDraft, NewUser,
};
use store_intake::model::GateEntry;
use store_intake::{
    Decision, IntakeConfig, IntakeService, LedgerStore, Principal, Role, TimeStamp,
};

#[derive(Parser)]
#[command(name = "store-intake")]
#[command(about = "Gate entry, inward verification and material issue ledger")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/store-intake.toml")]
    config: PathBuf,

    /// Database directory, overrides the configured path
    #[arg(long)]
    database: Option<PathBuf>,

    /// Username to act as (or STORE_INTAKE_USER)
    #[arg(short, long)]
    user: Option<String>,

    /// Password for --user (or STORE_INTAKE_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the first administrator account
    Bootstrap {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Create a user (admin only)
    AddUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// SECURITY, OFFICER, STORE_MANAGER or ADMIN
        #[arg(long)]
        role: Role,
    },

    /// List every account (admin only)
    Users,

    /// Switch off an account (admin only)
    DeactivateUser { username: String },

    /// List active officers
    Officers,

    /// Record a vehicle arriving at the gate (security)
    GateIn {
        #[arg(long)]
        vendor: String,
        /// Username of the officer who must clear the entry
        #[arg(long)]
        officer: String,
        #[arg(long, default_value = "")]
        vehicle: String,
        #[arg(long, default_value = "")]
        driver: String,
        #[arg(long, default_value = "")]
        driver_phone: String,
        #[arg(long, default_value = "")]
        material: String,
        #[arg(long)]
        approx_quantity: Option<u64>,
    },

    /// Stage 1 decision on a gate entry (assigned officer)
    Clear {
        entry_id: String,
        /// Reject with this reason instead of approving
        #[arg(long)]
        reject: Option<String>,
    },

    /// Record what physically arrived against a cleared entry (store manager)
    Receive {
        entry_id: String,
        /// Received line, repeatable: `CODE=QTY` or `desc:TEXT=QTY`,
        /// optionally followed by `@ROOM/RACK/SHELF`
        #[arg(long = "item", value_parser = parse_item, required = true)]
        items: Vec<ItemArg>,
        #[arg(long)]
        invoice: Option<String>,
        /// Invoice date as YYYY-MM-DD, defaults to today
        #[arg(long)]
        invoice_date: Option<String>,
        #[arg(long, default_value = "")]
        remarks: String,
    },

    /// Correct a processed entry before the final decision (store manager)
    EditReceipt {
        entry_id: String,
        #[arg(long)]
        invoice: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
        /// New received quantity, repeatable: `ITEM_ID=QTY`
        #[arg(long = "quantity", value_parser = parse_item_quantity)]
        quantities: Vec<(String, u64)>,
    },

    /// Final decision on a processed entry (assigned officer)
    Finalize {
        entry_id: String,
        #[arg(long)]
        reject: Option<String>,
    },

    /// Ask an officer to release stock (store manager)
    RequestIssue {
        #[arg(long)]
        code: String,
        #[arg(long)]
        quantity: u64,
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        officer: String,
    },

    /// Decide a pending issue (assigned officer)
    DecideIssue {
        issue_id: String,
        #[arg(long)]
        reject: Option<String>,
    },

    /// Work waiting on the caller
    Pending,

    /// Register a material (store manager)
    AddMaterial {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "Nos")]
        unit: String,
        #[arg(long, default_value = "0")]
        min_stock: u64,
    },

    /// List materials and their stock
    Materials,

    /// Correct a material's stock by a signed amount (admin only)
    Adjust {
        code: String,
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
        #[arg(long)]
        reason: String,
    },

    /// Materials below their minimum stock level
    LowStock,

    /// Finally approved items in the store
    Inventory,

    /// Stock postings for a material code
    Ledger { code: String },

    /// Issues requested by or assigned to the caller
    History,

    /// Print the issue note of an approved issue
    Receipt { issue_id: String },
}

fn main() {
    let cli = Cli::parse();

    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = IntakeConfig::load_from(&cli.config).context("loading configuration")?;
    if let Some(path) = cli.database.clone() {
        config.database.path = path;
    }

    let store = LedgerStore::open(&config.database)
        .with_context(|| format!("opening {}", config.database.path.display()))?;
    let service =
        IntakeService::new(store, config.inventory).with_password_cost(config.auth.bcrypt_cost);

    if let Commands::Bootstrap { username, password } = &cli.command {
        let admin = service.bootstrap_admin(username, password)?;
        println!("administrator {} created ({})", admin.username, admin.id);
        return Ok(service.store().flush()?);
    }

    let principal = login(&service, &cli)?;
    match cli.command {
        // handled before login
        Commands::Bootstrap { .. } => {}
        Commands::AddUser {
            username,
            password,
            role,
        } => {
            let user = service.create_user(&principal, NewUser::new(&username, &password, role))?;
            println!("{} {} ({})", user.role, user.username, user.id);
        }
        Commands::Users => {
            for user in service.list_users(&principal)? {
                let state = if user.active { "active" } else { "inactive" };
                println!("{:<24} {:<14} {:<9} {}", user.username, user.role, state, user.id);
            }
        }
        Commands::DeactivateUser { username } => {
            let user = service
                .list_users(&principal)?
                .into_iter()
                .find(|u| u.username == username)
                .with_context(|| format!("no user named {username}"))?;
            let user = service.deactivate_user(&principal, &user.id)?;
            println!("{} deactivated", user.username);
        }
        Commands::Officers => {
            for officer in service.list_officers(&principal)? {
                println!("{:<24} {}", officer.username, officer.id);
            }
        }
        Commands::GateIn {
            vendor,
            officer,
            vehicle,
            driver,
            driver_phone,
            material,
            approx_quantity,
        } => {
            let officer = officer_named(&service, &principal, &officer)?;
            let mut draft = GateEntryDraft::new()
                .set_vendor_name(&vendor)
                .set_vehicle_number(&vehicle)
                .set_driver(&driver, &driver_phone)
                .set_material_type_desc(&material)
                .set_request_officer(&officer.id);
            if let Some(quantity) = approx_quantity {
                draft = draft.set_approx_quantity(quantity);
            }
            let entry = service.create_gate_entry(&principal, draft)?;
            println!("{} {} ({})", entry.gate_pass_number, entry.status, entry.id);
        }
        Commands::Clear { entry_id, reject } => {
            let decision = match reject {
                Some(reason) => Decision::Reject(reason),
                None => Decision::Approve,
            };
            let entry = service.decide_stage_one(&principal, &entry_id, decision)?;
            println!("{} {}", entry.gate_pass_number, entry.status);
        }
        Commands::Receive {
            entry_id,
            items,
            invoice,
            invoice_date,
            remarks,
        } => {
            let mut draft = InwardDraft::new().set_remarks(&remarks);
            if let Some(invoice) = invoice {
                let date = match invoice_date {
                    Some(date) => parse_date(&date)?,
                    None => TimeStamp::new(),
                };
                draft = draft.set_invoice(&invoice, date);
            }
            for item in items {
                let line = match &item.code {
                    Some(code) => {
                        let material = service.material_by_code(&principal, code)?;
                        InwardItemDraft::linked(&material.id, item.quantity)
                    }
                    None => InwardItemDraft::described(&item.description, item.quantity),
                };
                draft = draft.add_item(line.set_location(&item.room, &item.rack, &item.shelf));
            }
            let process = service.process_store_entry(&principal, &entry_id, draft)?;
            println!("inward {} recorded for {}", process.id, entry_id);
            for item in &process.items {
                println!(
                    "  {} {:>8} {}",
                    item.id,
                    item.quantity_received,
                    item.material_description.as_deref().unwrap_or("")
                );
            }
        }
        Commands::EditReceipt {
            entry_id,
            invoice,
            remarks,
            quantities,
        } => {
            let mut update = InwardUpdate::new();
            if let Some(invoice) = invoice {
                update = update.set_invoice_no(&invoice);
            }
            if let Some(remarks) = remarks {
                update = update.set_remarks(&remarks);
            }
            for (item_id, quantity) in quantities {
                update = update.update_item(InwardItemUpdate::new(&item_id).set_quantity(quantity));
            }
            let process = service.update_store_entry(&principal, &entry_id, update)?;
            println!("inward {} updated", process.id);
        }
        Commands::Finalize { entry_id, reject } => match reject {
            Some(reason) => {
                let entry = service.final_reject(&principal, &entry_id, &reason)?;
                println!("{} {}", entry.gate_pass_number, entry.status);
            }
            None => {
                let approval = service.final_approve(&principal, &entry_id)?;
                println!("{} {}", approval.entry.gate_pass_number, approval.entry.status);
                for posting in approval.postings {
                    println!(
                        "  {} {:+} -> {}",
                        posting.material_id, posting.change_quantity, posting.balance_after
                    );
                }
            }
        },
        Commands::RequestIssue {
            code,
            quantity,
            purpose,
            department,
            officer,
        } => {
            let material = service.material_by_code(&principal, &code)?;
            let officer = officer_named(&service, &principal, &officer)?;
            let draft = IssueDraft::new(&material.id, quantity)
                .set_purpose(&purpose)
                .set_requesting_dept(&department)
                .set_officer(&officer.id);
            let issue = service.request_issue(&principal, draft)?;
            println!("issue {} {}", issue.id, issue.status);
        }
        Commands::DecideIssue { issue_id, reject } => match reject {
            Some(reason) => {
                let issue = service.reject_issue(&principal, &issue_id, &reason)?;
                println!("issue {} {}", issue.id, issue.status);
            }
            None => {
                let approval = service.approve_issue(&principal, &issue_id)?;
                println!(
                    "issue {} {}, note {}, balance {}",
                    approval.issue.id,
                    approval.issue.status,
                    approval.issue.issue_note_id.as_deref().unwrap_or("-"),
                    approval.posting.balance_after
                );
            }
        },
        Commands::Pending => match principal.role {
            Role::Security => print_entries(&service.gate_entries(&principal, None)?),
            Role::StoreManager => print_entries(&service.store_pending(&principal)?),
            Role::Officer | Role::Admin => {
                print_entries(&service.pending_stage_one(&principal)?);
                print_entries(&service.pending_final(&principal)?);
                for issue in service.pending_issues(&principal)? {
                    println!(
                        "{:<26} {:>8} {:<20} {}",
                        issue.id, issue.quantity_requested, issue.requesting_dept, issue.status
                    );
                }
            }
        },
        Commands::AddMaterial {
            code,
            name,
            category,
            unit,
            min_stock,
        } => {
            let draft = MaterialDraft::new(&code, &name)
                .set_category(&category)
                .set_unit(&unit)
                .set_min_stock_level(min_stock);
            let material = service.create_material(&principal, draft)?;
            println!("{} {} ({})", material.code, material.name, material.id);
        }
        Commands::Materials => {
            for m in service.list_materials(&principal)? {
                println!(
                    "{:<12} {:<28} {:>8} {:<6} min {}",
                    m.code, m.name, m.current_stock, m.unit, m.min_stock_level
                );
            }
        }
        Commands::Adjust { code, delta, reason } => {
            let material = service.material_by_code(&principal, &code)?;
            let posting = service.adjust_stock(&principal, &material.id, delta, &reason)?;
            println!(
                "{} {:+} -> {} ({})",
                material.code, posting.change_quantity, posting.balance_after, posting.reference_id
            );
        }
        Commands::LowStock => {
            for m in service.low_stock(&principal)? {
                println!(
                    "{:<12} {:<28} {:>8} of {} {}",
                    m.code, m.name, m.current_stock, m.min_stock_level, m.unit
                );
            }
        }
        Commands::Inventory => {
            for row in service.store_inventory(&principal)? {
                let inward = row
                    .inward_date
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<12} {:<28} {:<12} {:>8} {:<6} {:<20} {:<24} {}",
                    row.material_code.as_deref().unwrap_or("-"),
                    row.material_name,
                    row.category,
                    row.quantity,
                    row.unit,
                    row.location(),
                    inward,
                    row.officer_name.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Ledger { code } => {
            let material = service.material_by_code(&principal, &code)?;
            for posting in service.stock_ledger(&principal, &material.id)? {
                println!(
                    "{} {:<10} {:>+8} {:>8} {}",
                    posting.created_at,
                    posting.transaction_type.as_str(),
                    posting.change_quantity,
                    posting.balance_after,
                    posting.reference_id
                );
            }
        }
        Commands::History => {
            for issue in service.issue_history(&principal)? {
                println!(
                    "{} {:<26} {:>8} {:<20} {}",
                    issue.requested_at, issue.id, issue.quantity_requested, issue.requesting_dept, issue.status
                );
            }
        }
        Commands::Receipt { issue_id } => {
            println!("{}", service.issue_receipt(&principal, &issue_id)?);
        }
    }

    service.store().flush()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ItemArg {
    code: Option<String>,
    description: String,
    quantity: u64,
    room: String,
    rack: String,
    shelf: String,
}

/// `CODE=QTY` or `desc:TEXT=QTY`, optionally followed by `@ROOM/RACK/SHELF`.
fn parse_item(value: &str) -> Result<ItemArg, String> {
    let (line, place) = match value.rsplit_once('@') {
        Some((line, place)) => (line, place),
        None => (value, ""),
    };
    let mut location = place.splitn(3, '/').map(|p| p.trim().to_string());
    let room = location.next().unwrap_or_default();
    let rack = location.next().unwrap_or_default();
    let shelf = location.next().unwrap_or_default();

    let (what, quantity) = line
        .rsplit_once('=')
        .ok_or_else(|| format!("expected CODE=QTY or desc:TEXT=QTY, got {value}"))?;
    let quantity = quantity
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("bad quantity in {value}: {e}"))?;

    let what = what.trim();
    let (code, description) = match what.strip_prefix("desc:") {
        Some(description) => (None, description.trim().to_string()),
        None => (Some(what.to_string()), String::new()),
    };

    Ok(ItemArg {
        code,
        description,
        quantity,
        room,
        rack,
        shelf,
    })
}

fn parse_item_quantity(value: &str) -> Result<(String, u64), String> {
    let (item_id, quantity) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ITEM_ID=QTY, got {value}"))?;
    let quantity = quantity
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("bad quantity in {value}: {e}"))?;
    Ok((item_id.trim().to_string(), quantity))
}

fn parse_date(value: &str) -> anyhow::Result<TimeStamp<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invoice date {value} is not YYYY-MM-DD"))?;
    TimeStamp::new_with(date.year(), date.month(), date.day(), 0, 0, 0)
        .with_context(|| format!("invoice date {value} is out of range"))
}

fn print_entries(entries: &[GateEntry]) {
    for entry in entries {
        println!(
            "{} {:<14} {:<24} {:<32} {}",
            entry.created_at, entry.gate_pass_number, entry.vendor_name, entry.status, entry.id
        );
    }
}

fn officer_named(
    service: &IntakeService,
    principal: &Principal,
    username: &str,
) -> anyhow::Result<Principal> {
    service
        .list_officers(principal)?
        .into_iter()
        .find(|o| o.username == username)
        .with_context(|| format!("no active officer named {username}"))
}

fn login(service: &IntakeService, cli: &Cli) -> anyhow::Result<Principal> {
    let username = cli
        .user
        .clone()
        .or_else(|| std::env::var("STORE_INTAKE_USER").ok())
        .context("no user given, use --user or STORE_INTAKE_USER")?;
    let password = cli
        .password
        .clone()
        .or_else(|| std::env::var("STORE_INTAKE_PASSWORD").ok())
        .context("no password given, use --password or STORE_INTAKE_PASSWORD")?;

    Ok(service.authenticate(&username, &password)?)
}
