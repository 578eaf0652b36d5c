use assert_cmd::Command;
use predicates::str::contains;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn main_command() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).expect("Couldn't get cargo package name")
}

/// Run the (blocking) command on a worker thread so the mock server
/// keeps serving requests
async fn run_command(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert())
        .await
        .expect("command task panicked")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_page_scan_all_healthy_exits_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/ok">Fine</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut cmd = main_command();
    cmd.arg("--no-progress").arg(format!("{}/page", server.uri()));

    run_command(cmd)
        .await
        .success()
        .stdout(contains("All links are healthy"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_page_scan_with_broken_link_exits_two() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/dead">Dead</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut cmd = main_command();
    cmd.arg("--no-progress").arg(format!("{}/page", server.uri()));

    run_command(cmd)
        .await
        .failure()
        .code(2)
        .stdout(contains("/dead"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_site_scan_falls_back_without_sitemap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/ok">Fine</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut cmd = main_command();
    cmd.arg("--site").arg("--no-progress").arg(server.uri());

    run_command(cmd).await.success();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_json_format() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/dead">Dead</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut cmd = main_command();
    cmd.arg("--no-progress")
        .arg("--format")
        .arg("json")
        .arg(format!("{}/page", server.uri()));

    run_command(cmd)
        .await
        .code(2)
        .stdout(contains("\"phase\": \"completed\""))
        .stdout(contains("\"broken\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_csv_export() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/dead">Dead</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("Cannot create temp dir");
    let csv_path = dir.path().join("broken.csv");

    let mut cmd = main_command();
    cmd.arg("--no-progress")
        .arg("--export-csv")
        .arg(&csv_path)
        .arg(format!("{}/page", server.uri()));

    run_command(cmd).await.code(2);

    let contents = std::fs::read_to_string(&csv_path).expect("CSV file was not written");
    assert!(contents.starts_with("url,status,anchor_text,source_page"));
    assert!(contents.contains("404"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exclude_pattern_skips_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/dead">Dead</a>"#))
        .mount(&server)
        .await;
    // Must never be requested
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    let mut cmd = main_command();
    cmd.arg("--no-progress")
        .arg("--exclude")
        .arg("dead")
        .arg(format!("{}/page", server.uri()));

    run_command(cmd).await.success();
}

#[test]
fn test_invalid_url_fails() {
    main_command()
        .arg("--no-progress")
        .arg("not-a-url")
        .assert()
        .failure()
        .stderr(contains("Cannot parse"));
}
