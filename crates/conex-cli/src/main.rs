//! conex CLI - Conan extension commands for Artifactory, SBOM, lipo and Status Page

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use conex_core::ReportUpdate;
use conex_core::lipo::LayoutFilters;
use conex_repo::statuspage::{DEFAULT_KEYCHAIN_SERVICE, EventKind, IncidentUpdate, NewIncident};
use conex_repo::{ConnectionArgs, ProfileKind};

mod commands;
mod error;
mod exit_codes;
mod logging;
mod output;

use commands::OutputFormat;
use commands::build_info::CreateOptions;
use commands::profile::NewProfile;
use commands::statuspage::Session;

#[derive(Parser)]
#[command(name = "conex")]
#[command(version)]
#[command(about = "Conan extension commands for Artifactory, SBOM, lipo and Status Page", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// How to reach Artifactory
#[derive(Args, Debug, Clone, Default)]
struct ConnectionOpts {
    /// Name of a server saved with `conex server add`
    #[arg(long)]
    server: Option<String>,

    /// Artifactory url, like: https://<address>/artifactory
    #[arg(long)]
    url: Option<String>,

    /// User name for the repository
    #[arg(long)]
    user: Option<String>,

    /// Password for the user name (instead of token)
    #[arg(long)]
    password: Option<String>,

    /// Token for the repository (instead of password)
    #[arg(long)]
    token: Option<String>,
}

impl From<ConnectionOpts> for ConnectionArgs {
    fn from(opts: ConnectionOpts) -> Self {
        ConnectionArgs {
            server: opts.server,
            url: opts.url,
            user: opts.user,
            password: opts.password,
            token: opts.token,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage JFrog Build Info
    #[command(subcommand)]
    BuildInfo(BuildInfoCommands),

    /// Manage artifact properties in Artifactory
    #[command(subcommand)]
    Property(PropertyCommands),

    /// Promote a package list from one repository to another, server side
    Promote {
        /// Package list file (`conan list --format json`)
        list: PathBuf,

        /// Artifactory origin repository name
        #[arg(long = "from")]
        origin: String,

        /// Artifactory destination repository name
        #[arg(long = "to")]
        destination: String,

        /// Promote packages from this remote of the list
        #[arg(long)]
        remote: Option<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Manage Artifactory servers and credentials
    #[command(subcommand)]
    Server(ServerCommands),

    /// Manage credentials of Artifactory-backed Conan remotes
    #[command(subcommand)]
    Remote(RemoteCommands),

    /// Manage files of generic repositories
    #[command(subcommand)]
    GenericRepo(GenericRepoCommands),

    /// Manage reports of CI builds stored in a generic repository
    #[command(subcommand)]
    BuildReport(BuildReportCommands),

    /// Software bill of materials
    #[command(subcommand)]
    Sbom(SbomCommands),

    /// Universal binaries for Apple platforms
    #[command(subcommand)]
    Lipo(LipoCommands),

    /// Status Page incidents and maintenance
    #[command(subcommand)]
    Statuspage(StatuspageCommands),
}

#[derive(Subcommand)]
enum BuildInfoCommands {
    /// Create a build info from a Conan graph json of `conan install` or `conan create`
    Create {
        /// Conan generated graph JSON file
        graph: PathBuf,

        /// Build name
        name: String,

        /// Build number
        number: String,

        /// Repository to look artifacts for
        repository: String,

        /// Add the artifacts of the requirements of each module
        #[arg(long)]
        with_dependencies: bool,

        /// Also describe packages that came from the cache
        #[arg(long)]
        add_cached_deps: bool,

        /// CI job url recorded in the build info
        #[arg(long)]
        build_url: Option<String>,

        /// Conan version recorded as the build agent
        #[arg(long, env = "CONAN_VERSION")]
        conan_version: Option<String>,

        // only needed when the local cache lacks the uploaded files
        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Upload a build info, linking its artifacts to the build
    Upload {
        /// Build info JSON file
        build_info: PathBuf,

        /// Artifactory project
        #[arg(long)]
        project: Option<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Get a published build info
    Get {
        /// Build name
        name: String,

        /// Build number
        number: String,

        /// Artifactory project
        #[arg(long)]
        project: Option<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Promote a build from the source to the target repository
    Promote {
        /// Build name
        name: String,

        /// Build number
        number: String,

        /// Source repository
        source: String,

        /// Target repository
        target: String,

        /// Also copy the build dependencies
        #[arg(long)]
        dependencies: bool,

        /// Reason for the promotion
        #[arg(long)]
        comment: Option<String>,

        /// Artifactory project
        #[arg(long)]
        project: Option<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Remove published builds
    Delete {
        /// Build name
        name: String,

        /// Build numbers to delete (repeatable)
        #[arg(long = "build-number")]
        build_numbers: Vec<String>,

        /// Also remove the artifacts tagged with the build name and number
        #[arg(long)]
        delete_artifacts: bool,

        /// Remove every number of the build
        #[arg(long)]
        delete_all: bool,

        /// Artifactory project
        #[arg(long)]
        project: Option<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Create a build info with the modules of published builds
    Append {
        /// New build name
        name: String,

        /// New build number
        number: String,

        /// Published build as `name,number` (repeatable)
        #[arg(long = "build-info")]
        build_infos: Vec<String>,

        /// Conan version recorded as the build agent
        #[arg(long, env = "CONAN_VERSION")]
        conan_version: Option<String>,

        /// Artifactory project
        #[arg(long)]
        project: Option<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Create a signed release bundle from a build info
    CreateBundle {
        /// Build info JSON file
        build_info: PathBuf,

        /// Repository where the artifacts are located
        repository: String,

        /// Bundle name
        bundle: String,

        /// Bundle version
        version: String,

        /// Signing key name
        sign_key: String,

        #[command(flatten)]
        connection: ConnectionOpts,
    },
}

#[derive(Subcommand)]
enum PropertyCommands {
    /// Append properties to everything under a Conan reference
    Add {
        /// Artifactory repository
        repository: String,

        /// Conan reference
        reference: String,

        /// Property as key=value (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Set properties of a Conan reference
    Set {
        /// Artifactory repository
        repository: String,

        /// Conan reference
        reference: String,

        /// Property as key=value (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,

        /// Only set the properties on the reference folder itself
        #[arg(long)]
        no_recursive: bool,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Add build.name, build.number and extra properties to the artifacts of a build info
    BuildInfoAdd {
        /// Build info JSON file
        build_info: PathBuf,

        /// Extra property as key=value (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Save a server, exchanging the password for an encrypted one
    Add {
        /// Name of the server
        name: String,

        /// Artifactory url
        url: String,

        /// User name (prompted when missing)
        #[arg(long)]
        user: Option<String>,

        /// Password (prompted when neither password nor token is given)
        #[arg(long, conflicts_with = "token")]
        password: Option<String>,

        /// Access token, stored as is
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove a saved server
    Remove {
        /// Name of the server
        name: String,
    },

    /// List saved servers
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Save a remote, exchanging the password for an encrypted one
    Add {
        /// Name of the remote
        name: String,

        /// Artifactory url
        url: String,

        /// User name (prompted when missing)
        #[arg(long)]
        user: Option<String>,

        /// Password (prompted when missing)
        #[arg(long)]
        password: Option<String>,
    },

    /// Remove a saved remote
    Remove {
        /// Name of the remote
        name: String,
    },

    /// List saved remotes
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum GenericRepoCommands {
    /// Upload a file to a generic repository
    Upload {
        /// Artifactory repository
        repository: String,

        /// File to upload
        file: PathBuf,

        /// Folder to store the file in
        upload_path: String,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Print a file of a generic repository
    Read {
        /// Artifactory repository
        repository: String,

        /// Path of the file in the repository
        file: String,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// List the folders below a path
    List {
        /// Artifactory repository
        repository: String,

        /// Folder path in the repository
        path: String,

        #[command(flatten)]
        connection: ConnectionOpts,
    },
}

#[derive(Subcommand)]
enum BuildReportCommands {
    /// Create or update the report of one build configuration
    Add {
        /// Pull request number
        pull_request: String,

        /// Build number
        build: String,

        /// Report id, like <ref#rrev>-<profile_build>-<profile_host>
        id: String,

        /// Generic repository storing the reports
        repository: String,

        /// Status of the build
        #[arg(long)]
        build_status: Option<String>,

        /// Build log file
        #[arg(long)]
        build_log: Option<PathBuf>,

        /// Effective build profile of the build
        #[arg(long)]
        profile_build: Option<PathBuf>,

        /// Effective host profile of the build
        #[arg(long)]
        profile_host: Option<PathBuf>,

        /// Status of the test
        #[arg(long)]
        test_status: Option<String>,

        /// Test log file
        #[arg(long)]
        test_log: Option<PathBuf>,

        /// Effective build profile of the test
        #[arg(long)]
        test_profile_build: Option<PathBuf>,

        /// Effective host profile of the test
        #[arg(long)]
        test_profile_host: Option<PathBuf>,

        #[command(flatten)]
        connection: ConnectionOpts,
    },

    /// Collect the reports of a build into summary.json
    Summary {
        /// Pull request number
        pull_request: String,

        /// Build number
        build: String,

        /// Generic repository storing the reports
        repository: String,

        #[command(flatten)]
        connection: ConnectionOpts,
    },
}

#[derive(Subcommand)]
enum SbomCommands {
    /// CycloneDX 1.4 JSON of a Conan graph
    Cyclonedx {
        /// Conan generated graph JSON file
        graph: PathBuf,
    },
}

#[derive(Subcommand)]
enum LipoCommands {
    /// Create universal binaries from a Conan full_deploy
    ///
    /// Expects <input_path>/<name>/<version>/<build_type>/<architecture>.
    Create {
        /// Root of the deployment
        input_path: PathBuf,

        /// Architecture to merge (repeatable, default: every one found)
        #[arg(short = 'a', long = "architecture")]
        architectures: Vec<String>,

        /// Only merge these packages (repeatable)
        #[arg(long)]
        name_filter: Vec<String>,

        /// Only merge these build types (repeatable)
        #[arg(long)]
        build_type_filter: Vec<String>,

        /// Keep the single-architecture folders after merging
        #[arg(long)]
        keep_arch_folders: bool,
    },

    /// Print the architectures of binaries
    Info {
        /// Binary files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Status Page account options
#[derive(Args, Debug, Clone)]
struct SessionOpts {
    /// Status Page API token (default: $STATUSPAGE_TOKEN, then the macOS keychain)
    #[arg(long)]
    token: Option<String>,

    /// Status Page ID
    #[arg(short, long)]
    page: String,

    /// Ignore SSL verification
    #[arg(short = 'g', long)]
    ignore_ssl: bool,

    /// Keychain account holding the token
    #[arg(long)]
    keychain_user: Option<String>,

    /// Keychain service holding the token
    #[arg(long, default_value = DEFAULT_KEYCHAIN_SERVICE)]
    keychain_service: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl From<SessionOpts> for Session {
    fn from(opts: SessionOpts) -> Self {
        Session {
            token: opts.token,
            page: opts.page,
            ignore_ssl: opts.ignore_ssl,
            keychain_user: opts.keychain_user,
            keychain_service: opts.keychain_service,
            format: opts.format,
        }
    }
}

const INCIDENT_STATUSES: [&str; 4] = ["investigating", "identified", "monitoring", "resolved"];
const IMPACTS: [&str; 5] = ["none", "maintenance", "minor", "major", "critical"];
const COMPONENT_STATUSES: [&str; 4] = [
    "operational",
    "degraded_performance",
    "partial_outage",
    "major_outage",
];

/// What `resolve-incident` closes
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Event {
    Incident,
    Maintenance,
}

impl From<Event> for EventKind {
    fn from(event: Event) -> Self {
        match event {
            Event::Incident => EventKind::Incident,
            Event::Maintenance => EventKind::Maintenance,
        }
    }
}

#[derive(Subcommand)]
enum StatuspageCommands {
    /// Create a new incident
    CreateIncident {
        /// Incident title
        #[arg(short, long)]
        title: String,

        /// Incident body description
        #[arg(short, long)]
        message: Option<String>,

        /// Incident status
        #[arg(short, long, value_parser = INCIDENT_STATUSES)]
        status: Option<String>,

        /// Incident impact
        #[arg(short, long, value_parser = IMPACTS)]
        impact: Option<String>,

        /// Status of the affected components (default: major_outage)
        #[arg(long, value_parser = COMPONENT_STATUSES)]
        component_status: Option<String>,

        /// Affected component ids
        #[arg(short, long, num_args = 1..)]
        components: Vec<String>,

        #[command(flatten)]
        session: SessionOpts,
    },

    /// Update an existing incident
    UpdateIncident {
        /// Existing incident ID
        #[arg(long)]
        incident: String,

        /// Incident title
        #[arg(short, long)]
        title: Option<String>,

        /// Incident body description
        #[arg(short, long)]
        message: Option<String>,

        /// Incident status
        #[arg(short, long, value_parser = INCIDENT_STATUSES)]
        status: Option<String>,

        /// Incident impact
        #[arg(short, long, value_parser = IMPACTS)]
        impact: Option<String>,

        /// New status of the components
        #[arg(long, value_parser = COMPONENT_STATUSES)]
        component_status: Option<String>,

        /// Component ids to update
        #[arg(short, long, num_args = 1..)]
        components: Vec<String>,

        #[command(flatten)]
        session: SessionOpts,
    },

    /// Resolve an incident or complete a maintenance
    ResolveIncident {
        /// Existing incident ID
        #[arg(long)]
        incident: String,

        /// Event type to finish
        #[arg(short, long, value_enum)]
        event: Event,

        /// Components to mark operational
        #[arg(short, long, num_args = 1..)]
        components: Vec<String>,

        #[command(flatten)]
        session: SessionOpts,
    },

    /// Schedule an eight hour maintenance window
    ScheduleMaintenance {
        /// Maintenance title
        #[arg(short, long)]
        title: String,

        /// Maintenance body description
        #[arg(short, long)]
        message: Option<String>,

        /// Components under maintenance
        #[arg(short, long, num_args = 1..)]
        components: Vec<String>,

        /// Start (UTC) as YYYY-MM-DDTHH:MM:SS.ffffffZ, or `now`
        #[arg(short, long, default_value = "now")]
        scheduled: String,

        #[command(flatten)]
        session: SessionOpts,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.debug);

    if let Err(err) = run(cli.command).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
    Ok(())
}

async fn run(command: Commands) -> error::Result<()> {
    match command {
        Commands::BuildInfo(command) => run_build_info(command).await,
        Commands::Property(command) => run_property(command).await,

        Commands::Promote {
            list,
            origin,
            destination,
            remote,
            connection,
        } => {
            commands::promote::run(
                &list,
                &origin,
                &destination,
                remote.as_deref(),
                &connection.into(),
            )
            .await
        }

        Commands::Server(command) => match command {
            ServerCommands::Add {
                name,
                url,
                user,
                password,
                token,
            } => {
                let profile = NewProfile {
                    name,
                    url,
                    user,
                    password,
                    token,
                };
                commands::profile::add(ProfileKind::Server, profile).await
            }
            ServerCommands::Remove { name } => commands::profile::remove(ProfileKind::Server, &name),
            ServerCommands::List { format } => commands::profile::list(ProfileKind::Server, format),
        },

        Commands::Remote(command) => match command {
            RemoteCommands::Add {
                name,
                url,
                user,
                password,
            } => {
                let profile = NewProfile {
                    name,
                    url,
                    user,
                    password,
                    token: None,
                };
                commands::profile::add(ProfileKind::Remote, profile).await
            }
            RemoteCommands::Remove { name } => commands::profile::remove(ProfileKind::Remote, &name),
            RemoteCommands::List { format } => commands::profile::list(ProfileKind::Remote, format),
        },

        Commands::GenericRepo(command) => match command {
            GenericRepoCommands::Upload {
                repository,
                file,
                upload_path,
                connection,
            } => {
                commands::generic_repo::upload(&repository, &file, &upload_path, &connection.into())
                    .await
            }
            GenericRepoCommands::Read {
                repository,
                file,
                connection,
            } => commands::generic_repo::read(&repository, &file, &connection.into()).await,
            GenericRepoCommands::List {
                repository,
                path,
                connection,
            } => commands::generic_repo::list(&repository, &path, &connection.into()).await,
        },

        Commands::BuildReport(command) => match command {
            BuildReportCommands::Add {
                pull_request,
                build,
                id,
                repository,
                build_status,
                build_log,
                profile_build,
                profile_host,
                test_status,
                test_log,
                test_profile_build,
                test_profile_host,
                connection,
            } => {
                let update = ReportUpdate {
                    build_status,
                    build_log,
                    build_profile_build: profile_build,
                    build_profile_host: profile_host,
                    test_status,
                    test_log,
                    test_profile_build,
                    test_profile_host,
                };
                commands::build_report::add(
                    &pull_request,
                    &build,
                    &id,
                    &repository,
                    update,
                    &connection.into(),
                )
                .await
            }
            BuildReportCommands::Summary {
                pull_request,
                build,
                repository,
                connection,
            } => {
                commands::build_report::summary(&pull_request, &build, &repository, &connection.into())
                    .await
            }
        },

        Commands::Sbom(SbomCommands::Cyclonedx { graph }) => commands::sbom::cyclonedx(&graph),

        Commands::Lipo(command) => match command {
            LipoCommands::Create {
                input_path,
                architectures,
                name_filter,
                build_type_filter,
                keep_arch_folders,
            } => {
                let filters = LayoutFilters {
                    names: name_filter,
                    build_types: build_type_filter,
                    archs: architectures,
                };
                commands::lipo::create(&input_path, filters, keep_arch_folders)
            }
            LipoCommands::Info { files } => commands::lipo::info(&files),
        },

        Commands::Statuspage(command) => run_statuspage(command).await,
    }
}

async fn run_build_info(command: BuildInfoCommands) -> error::Result<()> {
    match command {
        BuildInfoCommands::Create {
            graph,
            name,
            number,
            repository,
            with_dependencies,
            add_cached_deps,
            build_url,
            conan_version,
            connection,
        } => {
            let options = CreateOptions {
                with_dependencies,
                add_cached_deps,
                build_url,
                conan_version,
            };
            commands::build_info::create(
                &graph,
                &name,
                &number,
                &repository,
                options,
                &connection.into(),
            )
            .await
        }
        BuildInfoCommands::Upload {
            build_info,
            project,
            connection,
        } => commands::build_info::upload(&build_info, project.as_deref(), &connection.into()).await,
        BuildInfoCommands::Get {
            name,
            number,
            project,
            connection,
        } => {
            commands::build_info::get(&name, &number, project.as_deref(), &connection.into()).await
        }
        BuildInfoCommands::Promote {
            name,
            number,
            source,
            target,
            dependencies,
            comment,
            project,
            connection,
        } => {
            commands::build_info::promote(
                &name,
                &number,
                &source,
                &target,
                dependencies,
                comment,
                project.as_deref(),
                &connection.into(),
            )
            .await
        }
        BuildInfoCommands::Delete {
            name,
            build_numbers,
            delete_artifacts,
            delete_all,
            project,
            connection,
        } => {
            commands::build_info::delete(
                &name,
                build_numbers,
                delete_artifacts,
                delete_all,
                project.as_deref(),
                &connection.into(),
            )
            .await
        }
        BuildInfoCommands::Append {
            name,
            number,
            build_infos,
            conan_version,
            project,
            connection,
        } => {
            commands::build_info::append(
                &name,
                &number,
                &build_infos,
                conan_version,
                project.as_deref(),
                &connection.into(),
            )
            .await
        }
        BuildInfoCommands::CreateBundle {
            build_info,
            repository,
            bundle,
            version,
            sign_key,
            connection,
        } => {
            commands::build_info::create_bundle(
                &build_info,
                &repository,
                &bundle,
                &version,
                &sign_key,
                &connection.into(),
            )
            .await
        }
    }
}

async fn run_property(command: PropertyCommands) -> error::Result<()> {
    match command {
        PropertyCommands::Add {
            repository,
            reference,
            properties,
            connection,
        } => {
            commands::property::add(&repository, &reference, &properties, &connection.into()).await
        }
        PropertyCommands::Set {
            repository,
            reference,
            properties,
            no_recursive,
            connection,
        } => {
            commands::property::set(
                &repository,
                &reference,
                &properties,
                !no_recursive,
                &connection.into(),
            )
            .await
        }
        PropertyCommands::BuildInfoAdd {
            build_info,
            properties,
            connection,
        } => {
            commands::property::build_info_add(&build_info, &properties, &connection.into()).await
        }
    }
}

async fn run_statuspage(command: StatuspageCommands) -> error::Result<()> {
    match command {
        StatuspageCommands::CreateIncident {
            title,
            message,
            status,
            impact,
            component_status,
            components,
            session,
        } => {
            let incident = NewIncident {
                title,
                message,
                status,
                impact,
                component_status,
                components,
            };
            commands::statuspage::create_incident(&session.into(), incident).await
        }
        StatuspageCommands::UpdateIncident {
            incident,
            title,
            message,
            status,
            impact,
            component_status,
            components,
            session,
        } => {
            let update = IncidentUpdate {
                title,
                message,
                status,
                impact,
                component_status,
                components,
            };
            commands::statuspage::update_incident(&session.into(), &incident, update).await
        }
        StatuspageCommands::ResolveIncident {
            incident,
            event,
            components,
            session,
        } => {
            commands::statuspage::resolve_incident(
                &session.into(),
                &incident,
                event.into(),
                &components,
            )
            .await
        }
        StatuspageCommands::ScheduleMaintenance {
            title,
            message,
            components,
            scheduled,
            session,
        } => {
            commands::statuspage::schedule_maintenance(
                &session.into(),
                &title,
                message.as_deref(),
                &components,
                &scheduled,
            )
            .await
        }
    }
}
