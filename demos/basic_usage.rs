//! End-to-end walkthrough against a local stub server: authenticate, send,
//! poll status, download both formats.
//!
//! Run with: `cargo run --example basic_usage --features all`

use ksef::client::KsefClient;
use ksef::core::{InvoiceFormat, KsefConfig, KsefCredentials, KsefEnvironment};
use ksef::stub::StubServer;

const SAMPLE_INVOICE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="http://ksef.mf.gov.pl/schema/gtw/svc/types/2021/10/01/0001">
    <InvoiceHeader>
        <InvoiceNumber>FA/001/2025</InvoiceNumber>
        <IssueDate>2025-01-01</IssueDate>
        <Seller>
            <TaxId>1234567890</TaxId>
            <Name>Example Company Sp. z o.o.</Name>
        </Seller>
        <Buyer>
            <TaxId>9876543210</TaxId>
            <Name>Customer Company Sp. z o.o.</Name>
        </Buyer>
    </InvoiceHeader>
    <InvoiceBody>
        <TotalAmount>1230.00</TotalAmount>
        <Currency>PLN</Currency>
    </InvoiceBody>
</Invoice>"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Local emulation of the platform — no network dependency
    let server = StubServer::start("127.0.0.1:0".parse()?).await?;
    println!("stub server listening on {}", server.base_url());

    let credentials = KsefCredentials::new("123-456-78-90", KsefEnvironment::Test)?;
    let config = KsefConfig::new(&server.base_url(), &server.base_url())?;
    let client = KsefClient::with_config(credentials, config);

    let token = client.authenticate().await?;
    println!("token acquired, expires at {}", token.expires_at);

    let ksef_number = client.send_invoice(SAMPLE_INVOICE_XML, Some("example_invoice.xml")).await?;
    println!("invoice sent: {ksef_number}");

    let status = client.get_status(&ksef_number).await?;
    println!("status: {status}");

    let xml_path = client.download(&ksef_number, InvoiceFormat::Xml, "downloads/invoice.xml").await?;
    println!("XML saved to {}", xml_path.display());

    let pdf_path = client.download(&ksef_number, InvoiceFormat::Pdf, "downloads/invoice.pdf").await?;
    println!("PDF saved to {}", pdf_path.display());

    client.close().await;
    server.shutdown().await?;
    Ok(())
}
