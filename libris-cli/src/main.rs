#![deny(missing_docs)]
//! A command-line interface for running a Libris circulation desk.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use libris_core::config::{self, LibraryConfig};
use libris_core::loans::{LoanView, ReturnOutcome, format_cents};
use libris_core::model::{BookDraft, MemberDraft, ReservationStatus, Role};
use libris_core::stats::Dashboard;
use libris_core::store::JsonDirStore;
use libris_core::{Library, LibraryError, totp};
use log::{error, info};
use std::fmt::Display;
use std::path::{Path, PathBuf};

type Desk = Library<JsonDirStore>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Initialize a new library\nlibris --library ./my_library init\n\n# Catalogue a book and register a member\nlibris --library ./my_library book add --title Dune --author 'Frank Herbert' --isbn 978-0441013593 --category Science --copies 3\nlibris --library ./my_library member add --email jane@user.com --name 'Jane Doe'\n\n# Lend and take back a copy\nlibris --library ./my_library loan issue --book-id <BOOK_ID> --member-id <MEMBER_ID>\nlibris --library ./my_library loan return --loan-id <LOAN_ID>\n\n# Enrol a member in two-factor login\nlibris --library ./my_library auth setup-2fa --member-id <MEMBER_ID>"
)]
struct Cli {
    /// The path to the library directory.
    #[arg(long, global = true, env = "LIBRIS_HOME")]
    library: Option<PathBuf>,

    /// Run the command as if it were this RFC 3339 instant instead of now.
    #[arg(long, global = true, value_name = "TIMESTAMP")]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new library at the specified path
    Init,
    /// Manage the book catalog
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Manage library members
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },
    /// Issue, return and list loans
    Loan {
        #[command(subcommand)]
        command: LoanCommands,
    },
    /// Manage the reservation queue
    Reserve {
        #[command(subcommand)]
        command: ReserveCommands,
    },
    /// Log in and manage two-factor authentication
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Show dashboard figures
    Stats {
        /// Show the dashboard as this member sees it
        #[arg(long, value_name = "MEMBER_ID")]
        member_id: Option<String>,
    },
}

#[derive(Args)]
struct BookFields {
    /// The book's title
    #[arg(long)]
    title: Option<String>,
    /// The book's author
    #[arg(long)]
    author: Option<String>,
    /// The ISBN as printed
    #[arg(long)]
    isbn: Option<String>,
    /// Shelf category, e.g. Fiction
    #[arg(long)]
    category: Option<String>,
    /// Number of copies owned
    #[arg(long)]
    copies: Option<u32>,
    /// Year of publication
    #[arg(long)]
    year: Option<u16>,
    /// Short description
    #[arg(long)]
    description: Option<String>,
    /// Shelf location
    #[arg(long)]
    location: Option<String>,
}

#[derive(Subcommand)]
enum BookCommands {
    /// Catalogue a new book
    Add {
        #[command(flatten)]
        fields: BookFields,
    },
    /// List every book
    List,
    /// Search title, author, category and ISBN
    Search {
        /// Text to look for
        #[arg()]
        term: String,
    },
    /// Change a book's details; copies on loan are kept
    Edit {
        /// The ID of the book to edit
        #[arg(long)]
        book_id: String,
        #[command(flatten)]
        fields: BookFields,
    },
    /// Remove a book from the catalog
    Delete {
        /// The ID of the book to delete
        #[arg(long)]
        book_id: String,
    },
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Register a new member
    Add {
        /// Login email
        #[arg(long)]
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// admin, librarian, user or guest
        #[arg(long, default_value_t = Role::User)]
        role: Role,
        /// Contact number
        #[arg(long)]
        phone: Option<String>,
    },
    /// List every member
    List,
    /// Change a member's details
    Edit {
        /// The ID of the member to edit
        #[arg(long)]
        member_id: String,
        /// New login email
        #[arg(long)]
        email: Option<String>,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New role
        #[arg(long)]
        role: Option<Role>,
        /// New contact number
        #[arg(long)]
        phone: Option<String>,
    },
    /// Remove a member
    Delete {
        /// The ID of the member to delete
        #[arg(long)]
        member_id: String,
    },
}

#[derive(Subcommand)]
enum LoanCommands {
    /// Lend a copy of a book to a member
    Issue {
        /// The ID of the book to lend
        #[arg(long)]
        book_id: String,
        /// The ID of the borrowing member
        #[arg(long)]
        member_id: String,
        /// Due date (YYYY-MM-DD or RFC 3339). Defaults to the library's loan length.
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
    },
    /// Take a copy back and charge any overdue fine
    Return {
        /// The ID of the loan to close
        #[arg(long)]
        loan_id: String,
    },
    /// List loans still out, soonest due first
    Active,
    /// List loans past their due date
    Overdue,
    /// List a member's loans, most recent first
    History {
        /// The ID of the member
        #[arg(long)]
        member_id: String,
    },
}

#[derive(Subcommand)]
enum ReserveCommands {
    /// Place a reservation for a member
    Create {
        /// The ID of the requested book
        #[arg(long)]
        book_id: String,
        /// The ID of the requesting member
        #[arg(long)]
        member_id: String,
    },
    /// List every reservation
    List,
    /// Move a reservation to a new status
    Set {
        /// The ID of the reservation
        #[arg(long)]
        reservation_id: String,
        /// pending, approved, rejected or fulfilled
        #[arg(long)]
        status: ReservationStatus,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Log in by email, with a TOTP code if two-factor login is on
    Login {
        /// Login email
        #[arg(long)]
        email: String,
        /// Six-digit authenticator code
        #[arg(long)]
        code: Option<String>,
    },
    /// Generate a secret for a member to scan into an authenticator app
    #[command(name = "setup-2fa")]
    Setup2fa {
        /// The ID of the member
        #[arg(long)]
        member_id: String,
    },
    /// Turn on two-factor login after checking a code from the new secret
    #[command(name = "enable-2fa")]
    Enable2fa {
        /// The ID of the member
        #[arg(long)]
        member_id: String,
        /// The base-32 secret printed by setup-2fa
        #[arg(long)]
        secret: String,
        /// A current code from the authenticator app
        #[arg(long)]
        code: String,
    },
    /// Turn off two-factor login and forget the secret
    #[command(name = "disable-2fa")]
    Disable2fa {
        /// The ID of the member
        #[arg(long)]
        member_id: String,
    },
    /// Print the current code for a base-32 secret
    Code {
        /// The base-32 secret
        #[arg(long)]
        secret: String,
    },
}

fn parse_due(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| format!("invalid due date '{value}'"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|due| due.with_timezone(&Utc))
        .map_err(|e| format!("invalid due date '{value}': {e}"))
}

fn fail(message: impl Display) -> ! {
    error!("{message}");
    std::process::exit(1);
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let now = cli.at.unwrap_or_else(Utc::now);

    let library_path = cli.library.unwrap_or_else(|| {
        fail("A --library path (or LIBRIS_HOME) is required.");
    });

    if matches!(cli.command, Commands::Init) {
        init_library(&library_path);
        return;
    }
    if !library_path.exists() {
        fail(format!(
            "Library path '{}' does not exist. Please create it with 'init'.",
            library_path.display()
        ));
    }

    let config = config::load_config(&library_path).unwrap_or_else(|e| {
        fail(format!("Failed to load library config: {e}"));
    });
    let mut desk = Library::new(JsonDirStore::open(&library_path), config);

    let outcome = match cli.command {
        Commands::Init => Ok(()),
        Commands::Book { command } => run_book(&mut desk, command),
        Commands::Member { command } => run_member(&mut desk, command, now),
        Commands::Loan { command } => run_loan(&mut desk, command, now),
        Commands::Reserve { command } => run_reserve(&mut desk, command, now),
        Commands::Auth { command } => run_auth(&mut desk, command, now),
        Commands::Stats { member_id } => run_stats(&desk, member_id.as_deref(), now),
    };
    if let Err(e) = outcome {
        fail(e);
    }
}

fn init_library(library_path: &Path) {
    info!("Initializing new library at '{}'", library_path.display());
    if let Err(e) = JsonDirStore::init(library_path) {
        fail(format!("Failed to create library: {e}"));
    }
    if !library_path.join(config::CONFIG_FILE).exists() {
        if let Err(e) = config::save_config(library_path, &LibraryConfig::default()) {
            fail(format!("Failed to save initial config: {e}"));
        }
    }
    info!("Library initialized successfully.");
}

fn merge_book(existing: Option<BookDraft>, fields: BookFields) -> BookDraft {
    let base = existing.unwrap_or_default();
    BookDraft {
        title: fields.title.unwrap_or(base.title),
        author: fields.author.unwrap_or(base.author),
        isbn: fields.isbn.unwrap_or(base.isbn),
        category: fields.category.unwrap_or(base.category),
        publish_year: fields.year.or(base.publish_year),
        description: fields.description.or(base.description),
        location: fields.location.or(base.location),
        total_copies: fields.copies.unwrap_or(base.total_copies),
    }
}

fn run_book(desk: &mut Desk, command: BookCommands) -> libris_core::Result<()> {
    match command {
        BookCommands::Add { fields } => {
            if fields.title.is_none() {
                fail("A --title is required to add a book.");
            }
            let draft = merge_book(
                Some(BookDraft {
                    total_copies: 1,
                    ..BookDraft::default()
                }),
                fields,
            );
            let book = desk.add_book(draft)?;
            println!("{}", book.id);
        }
        BookCommands::List => print_books(&desk.books()?),
        BookCommands::Search { term } => print_books(&desk.search_books(&term)?),
        BookCommands::Edit { book_id, fields } => {
            let existing = desk
                .get_book(&book_id)?
                .ok_or_else(|| LibraryError::NotFound {
                    kind: "book",
                    id: book_id.clone(),
                })?;
            let current = BookDraft {
                title: existing.title,
                author: existing.author,
                isbn: existing.isbn,
                category: existing.category,
                publish_year: existing.publish_year,
                description: existing.description,
                location: existing.location,
                total_copies: existing.total_copies,
            };
            let book = desk.update_book(&book_id, merge_book(Some(current), fields))?;
            println!(
                "Updated '{}': {}/{} copies available",
                book.title, book.available_copies, book.total_copies
            );
        }
        BookCommands::Delete { book_id } => {
            if desk.delete_book(&book_id)? {
                println!("Successfully deleted book '{book_id}'");
            } else {
                println!("Book with ID '{book_id}' not found in the catalog.");
            }
        }
    }
    Ok(())
}

fn print_books(books: &[libris_core::model::Book]) {
    if books.is_empty() {
        println!("No books found.");
        return;
    }
    println!(
        "{:<38} {:<30} {:<20} {:<12} {:<10}",
        "ID", "Title", "Author", "Category", "Available"
    );
    println!("{:-<114}", "");
    for book in books {
        println!(
            "{:<38} {:<30} {:<20} {:<12} {}/{}",
            book.id,
            book.title,
            book.author,
            book.category,
            book.available_copies,
            book.total_copies
        );
    }
}

fn run_member(desk: &mut Desk, command: MemberCommands, now: DateTime<Utc>) -> libris_core::Result<()> {
    match command {
        MemberCommands::Add {
            email,
            name,
            role,
            phone,
        } => {
            let member = desk.add_member(
                MemberDraft {
                    email,
                    name,
                    role,
                    phone,
                },
                now,
            )?;
            println!("{}", member.id);
        }
        MemberCommands::List => {
            let members = desk.members()?;
            if members.is_empty() {
                println!("No members registered.");
                return Ok(());
            }
            println!(
                "{:<38} {:<28} {:<20} {:<10} {:<4}",
                "ID", "Email", "Name", "Role", "2FA"
            );
            println!("{:-<104}", "");
            for member in members {
                println!(
                    "{:<38} {:<28} {:<20} {:<10} {}",
                    member.id,
                    member.email,
                    member.name,
                    member.role,
                    if member.two_factor_enabled { "on" } else { "off" }
                );
            }
        }
        MemberCommands::Edit {
            member_id,
            email,
            name,
            role,
            phone,
        } => {
            let existing = desk
                .get_member(&member_id)?
                .ok_or_else(|| LibraryError::NotFound {
                    kind: "member",
                    id: member_id.clone(),
                })?;
            let member = desk.update_member(
                &member_id,
                MemberDraft {
                    email: email.unwrap_or(existing.email),
                    name: name.unwrap_or(existing.name),
                    role: role.unwrap_or(existing.role),
                    phone: phone.or(existing.phone),
                },
            )?;
            println!("Updated member '{}' ({}, {})", member.id, member.email, member.role);
        }
        MemberCommands::Delete { member_id } => {
            if desk.delete_member(&member_id)? {
                println!("Successfully deleted member '{member_id}'");
            } else {
                println!("Member with ID '{member_id}' not found.");
            }
        }
    }
    Ok(())
}

fn run_loan(desk: &mut Desk, command: LoanCommands, now: DateTime<Utc>) -> libris_core::Result<()> {
    match command {
        LoanCommands::Issue {
            book_id,
            member_id,
            due,
        } => {
            let loan = desk.issue_loan(&book_id, &member_id, due, now)?;
            info!("Loan due {}", loan.due_date.format("%Y-%m-%d"));
            println!("{}", loan.id);
        }
        LoanCommands::Return { loan_id } => match desk.return_loan(&loan_id, now)? {
            ReturnOutcome::Returned(record) => {
                let fine = record.fine_cents.unwrap_or(0);
                if fine > 0 {
                    println!("Book returned. Overdue fine: ${}", format_cents(fine));
                } else {
                    println!("Book returned on time. No fine.");
                }
            }
            ReturnOutcome::AlreadyReturned(record) => {
                let returned = record
                    .return_date
                    .map_or_else(String::new, |at| format!(" on {}", at.format("%Y-%m-%d")));
                println!("Loan '{loan_id}' was already returned{returned}. Nothing to do.");
            }
            ReturnOutcome::NotFound => {
                println!("Loan with ID '{loan_id}' not found. Nothing to do.");
            }
        },
        LoanCommands::Active => {
            let active = desk.list_active_loans(now)?;
            print_loans(&desk.loan_views(active)?);
        }
        LoanCommands::Overdue => {
            let overdue = desk.list_overdue_loans(now)?;
            print_loans(&desk.loan_views(overdue)?);
        }
        LoanCommands::History { member_id } => {
            let history = desk.list_loans_for_member(&member_id, now)?;
            print_loans(&desk.loan_views(history)?);
        }
    }
    Ok(())
}

fn print_loans(loans: &[LoanView]) {
    if loans.is_empty() {
        println!("No loans found.");
        return;
    }
    println!(
        "{:<38} {:<30} {:<20} {:<12} {:<10} {:<8}",
        "ID", "Book", "Member", "Due", "Status", "Fine"
    );
    println!("{:-<122}", "");
    for loan in loans {
        let record = &loan.record;
        println!(
            "{:<38} {:<30} {:<20} {:<12} {:<10} {}",
            record.id,
            loan.book_title.as_deref().unwrap_or("(removed)"),
            loan.member_name.as_deref().unwrap_or("(removed)"),
            record.due_date.format("%Y-%m-%d").to_string(),
            record.status.to_string(),
            record.fine_cents.map_or_else(|| "-".to_string(), format_cents)
        );
    }
}

fn run_reserve(desk: &mut Desk, command: ReserveCommands, now: DateTime<Utc>) -> libris_core::Result<()> {
    match command {
        ReserveCommands::Create { book_id, member_id } => {
            let reservation = desk.reserve_book(&book_id, &member_id, now)?;
            println!("{}", reservation.id);
        }
        ReserveCommands::List => {
            let reservations = desk.reservations()?;
            if reservations.is_empty() {
                println!("No reservations.");
                return Ok(());
            }
            println!(
                "{:<38} {:<38} {:<38} {:<10}",
                "ID", "Book", "Member", "Status"
            );
            println!("{:-<126}", "");
            for r in reservations {
                println!("{:<38} {:<38} {:<38} {}", r.id, r.book_id, r.member_id, r.status);
            }
        }
        ReserveCommands::Set {
            reservation_id,
            status,
        } => match desk.set_reservation_status(&reservation_id, status)? {
            Some(r) => println!("Reservation '{}' is now {}", r.id, r.status),
            None => println!("Reservation with ID '{reservation_id}' not found."),
        },
    }
    Ok(())
}

fn run_auth(desk: &mut Desk, command: AuthCommands, now: DateTime<Utc>) -> libris_core::Result<()> {
    match command {
        AuthCommands::Login { email, code } => {
            let Some(outcome) = desk.login(&email)? else {
                fail("Invalid credentials.");
            };
            if outcome.requires_two_factor {
                let Some(code) = code else {
                    fail("Two-factor authentication is enabled; pass --code.");
                };
                if !desk.verify_two_factor(&outcome.member.id, &code, now)? {
                    fail("Invalid authentication code.");
                }
            }
            println!(
                "Logged in as {} ({}) [{}]",
                outcome.member.name, outcome.member.email, outcome.member.role
            );
        }
        AuthCommands::Setup2fa { member_id } => {
            let secret = desk.begin_two_factor(&member_id)?;
            println!("Secret: {}", secret.base32);
            println!("URI: {}", secret.otpauth_url);
            println!("Confirm with 'auth enable-2fa --member-id {member_id} --secret <SECRET> --code <CODE>'");
        }
        AuthCommands::Enable2fa {
            member_id,
            secret,
            code,
        } => {
            if !desk.enable_two_factor(&member_id, &secret, &code, now)? {
                fail("Invalid code. Two-factor authentication was not enabled.");
            }
            println!("Two-factor authentication enabled for member '{member_id}'");
        }
        AuthCommands::Disable2fa { member_id } => {
            desk.disable_two_factor(&member_id)?;
            println!("Two-factor authentication disabled for member '{member_id}'");
        }
        AuthCommands::Code { secret } => {
            match totp::current_code(&secret, now, &desk.config().totp) {
                Some(code) => println!("{code}"),
                None => fail("The secret is not valid base-32."),
            }
        }
    }
    Ok(())
}

fn run_stats(desk: &Desk, member_id: Option<&str>, now: DateTime<Utc>) -> libris_core::Result<()> {
    let dashboard = match member_id {
        Some(member_id) => desk.dashboard(member_id, now)?,
        None => Dashboard::Staff(desk.library_stats(now)?),
    };
    match dashboard {
        Dashboard::Staff(stats) => {
            println!("Total Books: {}", stats.total_books);
            println!("Active Loans: {}", stats.active_loans);
            println!("Pending Reservations: {}", stats.pending_reservations);
            println!("Overdue Items: {}", stats.overdue);
        }
        Dashboard::Member(stats) => {
            println!("My Loans: {}", stats.active_loans);
            println!("Overdue Items: {}", stats.overdue);
            println!("Fines Charged: ${}", format_cents(stats.fines_cents));
        }
    }
    Ok(())
}
