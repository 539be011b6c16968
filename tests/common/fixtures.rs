//! Catalog fixtures: reference lists, index documents and product details

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Category reference list with two allowed categories and one filtered one
pub const CATEGORIES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ICECAT-interface SYSTEM "http://data.icecat.biz/dtd/ICECAT-interface_response.dtd">
<ICECAT-interface>
  <Response Date="Mon Jan  1 00:00:00 2024" ID="1" Request_ID="1" Status="1">
    <CategoriesList>
      <Category ID="575" Score="100" Searchable="1">
        <Name ID="1" Value="digital cameras" langid="1"/>
        <Name ID="2" Value="digitale camera's" langid="2"/>
      </Category>
      <Category ID="1893" Score="90" Searchable="1">
        <Name ID="3" Value="smartphones" langid="1"/>
      </Category>
      <Category ID="153" Score="1" Searchable="0">
        <Name ID="4" Value="testing category" langid="1"/>
      </Category>
    </CategoriesList>
  </Response>
</ICECAT-interface>"#;

/// Supplier mapping
pub const SUPPLIERS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ICECAT-interface>
  <SupplierMappings>
    <SupplierMapping supplier_id="1" name="Canon"><Symbol>CANON</Symbol></SupplierMapping>
    <SupplierMapping supplier_id="2" name="Samsung"/>
  </SupplierMappings>
</ICECAT-interface>"#;

/// Daily index: three allowed records, one filtered record
pub const DAILY_INDEX_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ICECAT-interface SYSTEM "http://data.icecat.biz/dtd/files.index.dtd">
<ICECAT-interface>
  <files.index Generated="20240101000000">
    <file path="export/freexml.int/EN/100.xml" Product_ID="100" Updated="20240101" Quality="ICECAT"
          Supplier_id="1" Prod_ID="A100" Catid="575" On_Market="1" Model_Name="PowerShot A100"
          ReleaseDate="2021-03-01">
      <EAN_UPCS><EAN_UPC Value="4960999000001"/></EAN_UPCS>
      <Country_Markets><Country_Market Value="NL"/><Country_Market Value="BE"/></Country_Markets>
    </file>
    <file path="export/freexml.int/EN/200.xml" Product_ID="200" Supplier_id="2" Catid="1893"
          Model_Name="Galaxy">
      <EAN_UPCS>
        <EAN_UPC Value="8800000000001"/>
        <EAN_UPC Value="8800000000002"/>
      </EAN_UPCS>
    </file>
    <file path="export/freexml.int/EN/300.xml" Product_ID="300" Supplier_id="1" Catid="153"/>
    <file path="export/freexml.int/EN/400.xml" Product_ID="400" Supplier_id="9" Catid="575"/>
  </files.index>
</ICECAT-interface>"#;

/// Detail document for a product
pub fn product_xml(id: &str, short_summary: &str, short_desc: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE ICECAT-interface SYSTEM "http://data.icecat.biz/dtd/ICECAT-interface_response.dtd">
<ICECAT-interface>
  <Product Code="1" ID="{id}" Name="Product {id}" Prod_id="P{id}" Title="Product {id} title">
    <ProductDescription ID="9{id}" ShortDesc="{short_desc}" langid="1"/>
    <ShortSummaryDescription>{short_summary}</ShortSummaryDescription>
    <LongSummaryDescription>{short_summary}, long version</LongSummaryDescription>
  </Product>
</ICECAT-interface>"#
    )
}

/// Gzip-compress a document
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .unwrap_or_else(|e| panic!("gzip write failed: {}", e));
    encoder
        .finish()
        .unwrap_or_else(|e| panic!("gzip finish failed: {}", e))
}
