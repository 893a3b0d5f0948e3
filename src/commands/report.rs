use crate::api::{Drive, GoogleApi, SecretFile, Sheets, TokenProvider};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::fetch::{self, Fetcher};
use crate::model::decode;
use crate::provision::provision;
use crate::report::{ReportBuilder, ReportSummary};
use crate::secrets::{Keyring, SecretStore};
use crate::{Config, Result};
use chrono::{DateTime, Local};
use tracing::{debug, info};

/// Fetches recent transactions and writes them into a new copy of the budget report template.
pub async fn report(config: Config) -> Result<Out<ReportSummary>> {
    let secret = SecretFile::load(&config.creds_path())
        .await
        .pub_result(ErrorType::Credential)?;
    let token_provider = TokenProvider::load_or_authorize(&secret, &config.token_path())
        .await
        .pub_result(ErrorType::OAuth)?;
    let mut api = GoogleApi::new(token_provider)
        .await
        .pub_result(ErrorType::OAuth)?;

    run(&config, &mut api, &Keyring, &Fetcher::default(), Local::now()).await
}

/// Everything after authorization. `now` decides both the report name and the cutoff.
async fn run<A, S>(
    config: &Config,
    api: &mut A,
    secrets: &S,
    fetcher: &Fetcher,
    now: DateTime<Local>,
) -> Result<Out<ReportSummary>>
where
    A: Drive + Sheets,
    S: SecretStore + ?Sized,
{
    let builder = ReportBuilder::new(now).pub_result(ErrorType::Config)?;
    debug!("Skipping transactions dated before {}", builder.cutoff());

    let bytes = if config.test_mode() {
        fetch::read_fixture(&config.fixture_path())
            .await
            .pub_result(ErrorType::Fetch)?
    } else {
        let password = secrets
            .password(config.email())
            .pub_result(ErrorType::Credential)?;
        fetcher
            .fetch(config.email(), &password)
            .await
            .pub_result(ErrorType::Fetch)?
    };

    let transactions = decode(&bytes, config.schema()).pub_result(ErrorType::Decode)?;
    debug!("Decoded {} transactions", transactions.len());

    let mut sheet = provision(api, config.template_id(), now.date_naive())
        .await
        .pub_result(ErrorType::Provision)?;
    debug!(
        "Writing to sheet '{}' of {}",
        sheet.title(),
        sheet.spreadsheet_id()
    );

    let summary = builder.build(&transactions, &mut sheet);

    sheet
        .synchronize(api)
        .await
        .pub_result(ErrorType::Synchronize)?;
    info!(
        "Skipped {} transfers and {} transactions older than a month",
        summary.skipped_transfers, summary.skipped_stale
    );

    Ok(Out::new(
        format!(
            "Wrote {} expenses and {} income rows to spreadsheet {}",
            summary.expense_rows,
            summary.income_rows,
            sheet.spreadsheet_id()
        ),
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestApi;
    use crate::model::RowCol;
    use crate::secrets::StaticSecret;
    use chrono::Duration;
    use std::path::Path;
    use tempfile::TempDir;

    const TEMPLATE: &str = "template-id";

    async fn setup(dir: &Path, testmode: bool, fixture: &str) -> Config {
        let config_dir = dir.join("config");
        tokio::fs::create_dir_all(&config_dir).await.unwrap();
        let json = format!(
            r#"{{"email": "me@example.com", "testmode": {testmode}, "ignore": {{}}, "template_id": "{TEMPLATE}"}}"#
        );
        tokio::fs::write(config_dir.join("config.json"), json)
            .await
            .unwrap();
        tokio::fs::write(dir.join("test.json"), fixture)
            .await
            .unwrap();
        Config::load(dir).await.unwrap()
    }

    fn fixture(now: DateTime<Local>) -> String {
        let recent = (now - Duration::days(2)).timestamp_millis();
        let old = (now - Duration::days(70)).timestamp_millis();
        format!(
            r#"[
                {{"odate": {recent}, "amount": 12.5, "isSpending": true, "merchant": "Cafe \"Bean\"", "category": "Coffee"}},
                {{"odate": "{recent}", "amount": -50, "isSpending": true, "merchant": "Refund", "category": "Shopping"}},
                {{"odate": {recent}, "amount": 100, "isSpending": true, "isTransfer": true, "merchant": "Savings", "category": "Transfer"}},
                {{"odate": {old}, "amount": 30, "isSpending": true, "merchant": "Old", "category": "Food"}},
                {{"odate": {recent}, "amount": 2000, "isSpending": false, "merchant": "Employer", "category": "Paycheck"}}
            ]"#
        )
    }

    fn secrets() -> StaticSecret {
        StaticSecret {
            email: "me@example.com".to_string(),
            password: b"pw".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_report_end_to_end() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), true, &fixture(now)).await;
        let mut api = TestApi::with_template(TEMPLATE, &["Summary", "Transactions"]);

        let out = run(&config, &mut api, &secrets(), &Fetcher::default(), now)
            .await
            .unwrap();
        let summary = *out.structure().unwrap();
        assert_eq!(
            ReportSummary {
                expense_rows: 1,
                income_rows: 2,
                skipped_transfers: 1,
                skipped_stale: 1,
            },
            summary
        );
        assert_eq!(1, api.commits);

        let copy = api.files.get("copy-1").unwrap();
        assert_eq!(
            format!("{} Budget Report", now.format("%m/%d/%Y")),
            copy.title
        );

        let cells = api.sheet_cells("copy-1", "Transactions");
        assert_eq!(12, cells.len());
        let get = |row, col| cells.get(&RowCol::new(row, col)).cloned().unwrap();
        assert_eq!("=TO_DOLLARS(12.50)", get(4, 2));
        assert_eq!("=T(\"Cafe \"\"Bean\"\"\")", get(4, 3));
        assert_eq!("Coffee", get(4, 4));
        assert_eq!("=TO_DOLLARS(50.00)", get(4, 7));
        assert_eq!("=T(\"Refund\")", get(4, 8));
        assert_eq!("=TO_DOLLARS(2000.00)", get(5, 7));
        assert_eq!("Paycheck", get(5, 9));
        let date = (now - Duration::days(2)).format("%m/%d/%Y").to_string();
        assert_eq!(date, get(4, 1));
        assert_eq!(date, get(5, 6));
    }

    #[tokio::test]
    async fn test_report_runs_mintapi_outside_test_mode() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), false, "[]").await;
        let mut api = TestApi::with_template(TEMPLATE, &["Summary", "Transactions"]);

        // echo prints the arguments, which is not a JSON array.
        let err = run(&config, &mut api, &secrets(), &Fetcher::new("echo"), now)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::Decode, err.error_type());
        assert!(api.files.get("copy-1").is_none());
    }

    #[tokio::test]
    async fn test_report_missing_password() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), false, "[]").await;
        let mut api = TestApi::with_template(TEMPLATE, &["Summary", "Transactions"]);
        let secrets = StaticSecret {
            email: "someone-else@example.com".to_string(),
            password: Vec::new(),
        };

        let err = run(&config, &mut api, &secrets, &Fetcher::default(), now)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::Credential, err.error_type());
    }

    #[tokio::test]
    async fn test_report_fetch_failure() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), false, "[]").await;
        let mut api = TestApi::with_template(TEMPLATE, &["Summary", "Transactions"]);

        let err = run(&config, &mut api, &secrets(), &Fetcher::new("false"), now)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::Fetch, err.error_type());
    }

    #[tokio::test]
    async fn test_report_provision_failure() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), true, "[]").await;
        let mut api = TestApi::with_template("another-template", &["Summary", "Transactions"]);

        let err = run(&config, &mut api, &secrets(), &Fetcher::default(), now)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::Provision, err.error_type());
    }

    #[tokio::test]
    async fn test_report_synchronize_failure() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), true, &fixture(now)).await;
        let mut api = TestApi::with_template(TEMPLATE, &["Summary", "Transactions"]);
        api.fail_updates = true;

        let err = run(&config, &mut api, &secrets(), &Fetcher::default(), now)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::Synchronize, err.error_type());
        assert!(api.sheet_cells("copy-1", "Transactions").is_empty());
    }

    #[tokio::test]
    async fn test_report_decode_failure() {
        let now = Local::now();
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path(), true, r#"[{"odate": "yesterday", "amount": 1}]"#).await;
        let mut api = TestApi::with_template(TEMPLATE, &["Summary", "Transactions"]);

        let err = run(&config, &mut api, &secrets(), &Fetcher::default(), now)
            .await
            .unwrap_err();
        assert_eq!(ErrorType::Decode, err.error_type());
    }
}
