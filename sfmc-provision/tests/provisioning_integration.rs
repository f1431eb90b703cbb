//! End-to-end provisioning against a mock platform.

use serde_json::json;
use sfmc_provision::{
    OrgSetup, ProvisionConfig, ProvisionError, Provisioner, ProvisioningSession, Stage, Template,
};
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SOAP_NS: &str = r#"xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/""#;

fn soap_body(inner: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope {SOAP_NS}><soap:Body>{inner}</soap:Body></soap:Envelope>"#)
}

fn retrieve_ok(results: &str) -> String {
    soap_body(&format!(
        r#"<RetrieveResponseMsg xmlns="http://exacttarget.com/wsdl/partnerAPI"><OverallStatus>OK</OverallStatus><RequestID>r-1</RequestID>{results}</RetrieveResponseMsg>"#
    ))
}

fn create_ok(new_id: &str) -> String {
    soap_body(&format!(
        r#"<CreateResponse xmlns="http://exacttarget.com/wsdl/partnerAPI"><Results><StatusCode>OK</StatusCode><StatusMessage>Created.</StatusMessage><NewID>{new_id}</NewID></Results><OverallStatus>OK</OverallStatus></CreateResponse>"#
    ))
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "e2e-token",
            "token_type": "Bearer",
            "expires_in": 1079
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/userinfo"))
        .and(header("authorization", "Bearer e2e-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organization": { "member_id": 510 },
            "rest": {
                "rest_instance_url": format!("{}/", server.uri()),
                "soap_instance_url": format!("{}/", server.uri())
            }
        })))
        .mount(server)
        .await;
}

async fn mount_name_check(server: &MockServer, results: &str) {
    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Retrieve"))
        .and(body_string_contains("<ObjectType>DataExtension</ObjectType>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(retrieve_ok(results)))
        .expect(1)
        .mount(server)
        .await;
}

fn provisioner(server: &MockServer) -> Provisioner {
    let config = ProvisionConfig::builder()
        .auth_base_url(server.uri())
        .client_credentials("client-id", "client-secret")
        .org_setup_key("Org Setup")
        .build()
        .unwrap();
    Provisioner::from_config(&config).unwrap()
}

fn org42() -> Template {
    serde_json::from_value(json!({
        "Template Name": "Org42",
        "Customer Unique ID": "x@y.com",
        "option 1": "Birth Date"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_provision_creates_missing_folder_and_loads_row() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_name_check(&server, "").await;

    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Retrieve"))
        .and(body_string_contains("<Value>Hearsay Integrations</Value>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(retrieve_ok("")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Retrieve"))
        .and(body_string_contains("<Value>Data Extensions</Value>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(retrieve_ok(
            "<Results><ID>1</ID><Name>Data Extensions</Name></Results>",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Create"))
        .and(body_string_contains(r#"xsi:type="DataFolder""#))
        .and(body_string_contains("<ParentFolder><ID>1</ID></ParentFolder>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(create_ok("777")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Create"))
        .and(body_string_contains(r#"xsi:type="DataExtension""#))
        .and(body_string_contains("<CategoryID>777</CategoryID>"))
        .and(body_string_contains("<CustomerKey>Org42</CustomerKey>"))
        .and(body_string_contains("<Name>Birth Date</Name><FieldType>Date</FieldType>"))
        .and(body_string_contains("<IsSendable>true</IsSendable>"))
        .and(body_string_contains(
            r#"<fueloauth xmlns="http://exacttarget.com">e2e-token</fueloauth>"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(create_ok("9001")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hub/v1/dataevents/key:Org42/rowset"))
        .and(header("authorization", "Bearer e2e-token"))
        .and(body_json(json!({
            "Template Name": "Org42",
            "Customer Unique ID": "x@y.com",
            "option 1": "Birth Date"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ProvisioningSession::new();
    let report = provisioner(&server)
        .provision(&mut session, &org42())
        .await
        .unwrap();

    assert_eq!(report.data_extension_key, "Org42");
    assert_eq!(report.folder.id, "777");
    assert!(report.folder_created);
    assert_eq!(report.new_id.as_deref(), Some("9001"));
    assert_eq!(session.folder().map(|f| f.id.as_str()), Some("777"));
}

#[tokio::test]
async fn test_existing_name_fails_before_any_create() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_name_check(
        &server,
        "<Results><CustomerKey>Org42</CustomerKey><Name>Org42</Name></Results>",
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Create"))
        .respond_with(ResponseTemplate::new(200).set_body_string(create_ok("1")))
        .expect(0)
        .mount(&server)
        .await;

    let error = provisioner(&server)
        .provision(&mut ProvisioningSession::new(), &org42())
        .await
        .unwrap_err();

    assert!(matches!(error, ProvisionError::DuplicateName { .. }));
    assert_eq!(error.to_string(), "Template Name 'Org42' already exists");
}

#[tokio::test]
async fn test_soap_fault_during_create_is_reported() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_name_check(&server, "").await;
    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Create"))
        .respond_with(ResponseTemplate::new(500).set_body_string(soap_body(
            "<soap:Fault><faultcode>soap:Server</faultcode><faultstring>Unable to save</faultstring></soap:Fault>",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hub/v1/dataevents/key:Org42/rowset"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = ProvisioningSession::with_folder(sfmc_provision::FolderRef::new("100"));
    let error = provisioner(&server)
        .provision(&mut session, &org42())
        .await
        .unwrap_err();

    assert_eq!(error.stage(), Stage::Create);
    assert!(error.to_string().contains("Unable to save"));
    assert!(error.raw_body().unwrap().contains("<faultstring>"));
}

#[tokio::test]
async fn test_org_setup_posts_identifiers() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/hub/v1/dataevents/key:Org%20Setup/rowset"))
        .and(body_json(json!({
            "Hearsay Org ID": "ORG-1",
            "Hearsay User Reference ID": "77",
            "Customer Unique ID": "a@b.com"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let response = provisioner(&server)
        .load_org_setup(&OrgSetup {
            org_id: "ORG-1".to_string(),
            user_reference_id: "77".to_string(),
            customer_unique_id: "a@b.com".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(response.status, 200);
}
