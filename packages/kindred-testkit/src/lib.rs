//! Test support: disposable Postgres databases and tracing output routed through the harness.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kindred_config::Postgres;

const DSN_ENV: &str = "KINDRED_PG_DSN";
/// Maintenance databases tried in order when creating and dropping test databases.
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

/// The base DSN for Postgres-backed tests, when one is configured.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

/// Installs a `fmt` subscriber writing through the test harness. `RUST_LOG` overrides
/// `log_level`. Repeated calls are no-ops.
pub fn init_tracing(log_level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// A uniquely named database on the server behind the base DSN.
///
/// Dropped by [`TestDatabase::cleanup`], or on drop as a fallback.
pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: Maintenance,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Invalid {DSN_ENV}: {err}.")))?;
		let maintenance = Maintenance::locate(&base).await?;
		let name = format!("kindred_test_{}", Uuid::new_v4().simple());

		maintenance.create(&name).await?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Storage settings pointing at this database.
	pub fn postgres_config(&self, pool_max_conns: u32) -> Postgres {
		Postgres { dsn: self.dsn.clone(), pool_max_conns }
	}

	/// Close every pool using this database first; open sessions are terminated.
	pub async fn cleanup(mut self) -> Result<()> {
		self.maintenance.drop_database(&self.name).await?;
		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let maintenance = self.maintenance.clone();
		// The owning runtime may be shutting down; use a private one.
		let worker = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(format!("Failed to start cleanup runtime: {err}.")))
				.and_then(|runtime| runtime.block_on(maintenance.drop_database(&name)));

			if let Err(err) = result {
				eprintln!("Failed to drop test database {name}: {err}");
			}
		});

		let _ = worker.join();
	}
}

#[derive(Clone)]
struct Maintenance {
	options: PgConnectOptions,
}
impl Maintenance {
	async fn locate(base: &PgConnectOptions) -> Result<Self> {
		let mut failures = Vec::new();

		for database in MAINTENANCE_DATABASES {
			let options = base.clone().database(database);

			match PgConnection::connect_with(&options).await {
				Ok(conn) => {
					let _ = conn.close().await;

					return Ok(Self { options });
				},
				Err(err) => failures.push(format!("{database}: {err}")),
			}
		}

		Err(Error::Message(format!(
			"No maintenance database reachable ({}).",
			failures.join("; ")
		)))
	}

	async fn connect(&self) -> Result<PgConnection> {
		Ok(PgConnection::connect_with(&self.options).await?)
	}

	async fn create(&self, name: &str) -> Result<()> {
		let mut conn = self.connect().await?;

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;

		Ok(())
	}

	async fn drop_database(&self, name: &str) -> Result<()> {
		let mut conn = self.connect().await?;

		sqlx::query(
			"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
		)
		.bind(name)
		.fetch_all(&mut conn)
		.await?;
		conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str()).await?;

		Ok(())
	}
}
