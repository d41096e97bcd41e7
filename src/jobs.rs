// Jobs are hardcoded here; `[[jobs]]` in the config file adds more.

use crate::domain::filter::FilterRule;
use crate::domain::job::{EmptyPolicy, JobSpec, StackedSource};
use crate::domain::preserve::PreservedColumn;
use crate::domain::sheets::{cell_range::CellRangeParseError, location::SheetLocation};

pub mod documents {
    pub mod allocation {
        pub const DESTINATION: &str = "1HGkBcL4mxgrTs5wNhWz9OgALIE-2pMoZ_P8P2vCsIls";
        pub const LEADS: &str = "1z1EsD9S4yIjn3MNAAjvdsApw3T6R-K8KuJf2s1rnkgE";
        pub const VENDOR_LEADS: &str = "1AYOZnHLQBi7GIqn1PdTNNRko5gwtngJZZhB_UCHPQPo";
        pub const TELECALLING: &str = "1fcHmuexLkj_Rjxai38aSewk76lcls-O9EDR1VGPul5w";
        pub const REFERRALS: &str = "1MHG10SDEYoeBfq512t_rkBb7lpUvBD3XNRCLUrv0MCc";
        pub const REJOININGS: &str = "1jmqNQt1VIKCAFCg9qBhkeYr1zrNg54Q-9c1PHY_bb5w";
        pub const NEW_JOININGS: &str = "1o6nrw8zgg48q1Qbn01J23M8ePYel9IraqXCcuUPMwlM";
    }

    pub mod collection {
        pub const SOURCE: &str = "1D4LjhxfaBpV1zUSCrQ7Xfe2NpeNRNgSdli16lh4anlo";
        pub const DESTINATION: &str = "1sipU5ThP9PmJYBBn06XxGZkPvUNobBCHQWo8jNwUyuw";
    }

    pub mod fleet {
        pub const COMBINED: &str = "1yDoXBuatVAep4z47L-WbSYvEELKZ3VOJm1CWwSQdWkU";
        pub const ALLOCATION: &str = "1fS8creQX5JyxMVeSQmsRzd0Tfm4j4m8-mZW6l6Athc4";
        pub const CAR_INFO: &str = "1LYtmHJ3NOGs0Likkl7_eIfemX-g9kVGhfIN1FzMGBh4";
        pub const COLLECTION_DETAILS: &str = "1HMlQzPbqpEh2OiIZT6h5UxjfY-wmWUrLQDgahNsxzl0";
    }
}

const DELHI_NCR: &str = "delhi ncr";
const COLLECTION_CITIES: [&str; 4] = ["Delhi NCR", "Sukhrali", "Noida", "Delhi"];

/// Car info columns kept from `B:L`: loc id, partner ETM, start date, end
/// date, allocation date, car type, business vertical and the remark column.
const CAR_INFO_COLUMNS: [usize; 8] = [0, 1, 4, 5, 6, 7, 8, 10];

/// Revshare columns kept under the leasing block, column C dropped.
const REVSHARE_COLUMNS: [usize; 7] = [0, 1, 3, 4, 5, 6, 7];

fn at(document_id: &str, tab: &str, range: &str) -> Result<SheetLocation, CellRangeParseError> {
    Ok(SheetLocation::new(document_id, tab, range.parse()?))
}

/// A lead sheet filtered on its city column into a tab of the allocation sheet.
fn allocation_job(
    source_document: &str,
    source_tab: &str,
    range: &str,
    destination_tab: &str,
    city_column: usize,
) -> Result<JobSpec, CellRangeParseError> {
    Ok(JobSpec::new(
        destination_tab,
        at(source_document, source_tab, range)?,
        at(documents::allocation::DESTINATION, destination_tab, range)?,
    )
    .with_filter(FilterRule::match_any(city_column, &[DELHI_NCR])))
}

pub fn builtin_jobs() -> Result<Vec<JobSpec>, CellRangeParseError> {
    use documents::*;

    Ok(vec![
        allocation_job(allocation::LEADS, "raw_leads", "A:AC", "FSE", 2)?,
        allocation_job(allocation::LEADS, "Exception_File", "A:S", "Exception_File", 2)?,
        allocation_job(allocation::VENDOR_LEADS, "raw_leads", "A:AC", "Vendor", 2)?,
        allocation_job(allocation::TELECALLING, "New Joins", "A:Q", "Telecalling", 2)?,
        allocation_job(allocation::REFERRALS, "Raw_Data", "A:AC", "Referal", 3)?,
        allocation_job(allocation::REJOININGS, "Rejoinings", "A:P", "Rejoin", 2)?,
        // Column U holds remarks typed into the destination
        JobSpec::new(
            "New Joining",
            at(allocation::NEW_JOININGS, "Raw Data", "A:U")?,
            at(allocation::DESTINATION, "New Joining", "A1:U")?,
        )
        .with_filter(FilterRule::match_any(0, &[DELHI_NCR]))
        .with_preserved_column(PreservedColumn::positional(20))
        .without_tab_creation(),
        // Two report rows sit above the header
        JobSpec::new(
            "OS_Collection",
            at(collection::SOURCE, "OS_ETM_Summary", "A:Q")?,
            at(collection::DESTINATION, "OS_Collection", "A:Q")?,
        )
        .with_header_row_offset(2)
        .with_filter(FilterRule::match_any(1, &COLLECTION_CITIES))
        .with_on_empty(EmptyPolicy::WriteHeader)
        .without_tab_creation(),
        // Revshare goes two blank rows under the leasing block
        JobSpec::new(
            "Recovery",
            at(collection::SOURCE, "Leasing_Raw", "A:G")?,
            at(collection::DESTINATION, "Recovery", "A:G")?,
        )
        .with_stacked_source(
            StackedSource::new(at(collection::SOURCE, "Revshare_Raw", "A:H")?)
                .with_gap_rows(2)
                .with_filter(FilterRule::NonEmpty { column: 0 })
                .with_columns(REVSHARE_COLUMNS.to_vec()),
        )
        .without_tab_creation(),
        JobSpec::new(
            "Combined",
            at(fleet::COMBINED, "Combined CNG", "A2:AL")?,
            at(fleet::ALLOCATION, "Combined", "A2:AL")?,
        )
        .with_header_rows(0)
        .without_tab_creation(),
        JobSpec::new(
            "Details",
            at(fleet::CAR_INFO, "Car Info", "A2:K")?,
            at(fleet::COLLECTION_DETAILS, "Details", "A2:K")?,
        )
        .with_header_rows(0)
        .without_tab_creation(),
        JobSpec::new(
            "Info Data",
            at(fleet::COMBINED, "Car Info from CNG", "B:L")?,
            at(fleet::CAR_INFO, "Info Data", "A:H")?,
        )
        .with_filter(FilterRule::NonEmpty { column: 1 })
        .with_columns(CAR_INFO_COLUMNS.to_vec())
        // EV rows follow the CNG ones, EV header dropped
        .with_stacked_source(
            StackedSource::new(at(fleet::COMBINED, "Car Info from EV", "B:L")?)
                .with_header_row_offset(1)
                .with_header_rows(0)
                .with_filter(FilterRule::NonEmpty { column: 1 })
                .with_columns(CAR_INFO_COLUMNS.to_vec()),
        ),
    ])
}
