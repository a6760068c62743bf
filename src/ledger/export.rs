//! Downloads the filtered ledger as an Excel workbook.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    auth::CurrentUser,
    ledger::{
        core::{EntryDetails, query_entries},
        filter::{DefaultPeriod, EntryQuery},
    },
    timezone::{format_local, get_offset_at},
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Lancamentos";

/// The header row and the width of each column.
const COLUMNS: [(&str, f64); 6] = [
    ("Data (Brasília)", 20.0),
    ("Nº OS", 14.0),
    ("Cooperado", 28.0),
    ("Estabelecimento", 28.0),
    ("Valor (R$)", 14.0),
    ("Descrição", 40.0),
];

const FILENAME_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year][month][day]_[hour][minute]");

/// The state needed for the [export_entries] route handler.
#[derive(Debug, Clone)]
pub struct ExportState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for ExportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// One spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
struct ExportRow {
    created_at: String,
    order_number: String,
    member_name: String,
    establishment_name: String,
    amount: f64,
    description: String,
}

fn to_export_rows(entries: Vec<EntryDetails>, timezone: &str) -> Vec<ExportRow> {
    entries
        .into_iter()
        .map(|details| ExportRow {
            created_at: format_local(details.entry.created_at, timezone),
            order_number: details.entry.order_number,
            member_name: details.member_name,
            establishment_name: details.establishment_name,
            amount: details.entry.amount.as_f64(),
            description: details.entry.description.unwrap_or_default(),
        })
        .collect()
}

fn write_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let amount_format = Format::new().set_num_format("#,##0.00");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (column, (header, width)) in COLUMNS.iter().enumerate() {
        let column = column as u16;
        worksheet.write_string_with_format(0, column, *header, &header_format)?;
        worksheet.set_column_width(column, *width)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        worksheet.write_string(line, 0, &row.created_at)?;
        worksheet.write_string(line, 1, &row.order_number)?;
        worksheet.write_string(line, 2, &row.member_name)?;
        worksheet.write_string(line, 3, &row.establishment_name)?;
        worksheet.write_number_with_format(line, 4, row.amount, &amount_format)?;
        worksheet.write_string(line, 5, &row.description)?;
    }

    workbook.save_to_buffer()
}

fn export_filename(now: OffsetDateTime, timezone: &str) -> String {
    let local = match get_offset_at(timezone, now) {
        Some(offset) => now.to_offset(offset),
        None => now,
    };
    let stamp = local
        .format(FILENAME_FORMAT)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());

    format!("lancamentos_{stamp}.xlsx")
}

/// A route handler that responds with the entries matching the query as an
/// `.xlsx` attachment.
///
/// Without a period in the query every entry the user may see is exported.
pub async fn export_entries(
    State(state): State<ExportState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<EntryQuery>,
) -> Result<Response, Error> {
    let now = OffsetDateTime::now_utc();
    let filter = query.to_filter(&user, DefaultPeriod::Everything, now, &state.local_timezone)?;

    let entries = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        query_entries(&filter, &state.local_timezone, &connection)
            .inspect_err(|error| tracing::error!("could not get entries for export: {error}"))?
    };

    let rows = to_export_rows(entries, &state.local_timezone);
    let bytes = write_workbook(&rows)
        .inspect_err(|error| tracing::error!("could not write spreadsheet: {error}"))
        .map_err(|error| Error::ExportError(error.to_string()))?;

    tracing::info!("Exported {} ledger entries for {user:?}", rows.len());

    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_owned()),
            (
                CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    export_filename(now, &state.local_timezone)
                ),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use axum::{
        Extension,
        extract::{Query, State},
    };
    use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
    use time::macros::datetime;

    use crate::{
        ledger::{core::query_entries, filter::EntryFilter, filter::EntryQuery},
        money::Money,
        test_utils::{
            TEST_TIMEZONE, admin_user, assert_content_type, assert_status_ok, establishment_user,
            get_header, get_test_connection, insert_entry, seed_establishment, seed_member,
        },
    };

    use super::{
        COLUMNS, ExportRow, ExportState, SHEET_NAME, export_entries, export_filename,
        to_export_rows, write_workbook,
    };

    #[test]
    fn header_is_fixed() {
        let headers: Vec<&str> = COLUMNS.iter().map(|(header, _)| *header).collect();

        assert_eq!(
            headers,
            [
                "Data (Brasília)",
                "Nº OS",
                "Cooperado",
                "Estabelecimento",
                "Valor (R$)",
                "Descrição"
            ]
        );
    }

    #[test]
    fn rows_follow_descending_time_in_local_time() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::ZERO, &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);
        insert_entry(
            datetime!(2024-03-02 02:30 UTC),
            Money::from_cents(1050),
            member,
            establishment,
            &connection,
        );
        insert_entry(
            datetime!(2024-01-10 15:00 UTC),
            Money::from_reais(3),
            member,
            establishment,
            &connection,
        );
        insert_entry(
            datetime!(2024-02-20 12:00 UTC),
            Money::from_reais(7),
            member,
            establishment,
            &connection,
        );

        let entries = query_entries(&EntryFilter::default(), TEST_TIMEZONE, &connection).unwrap();
        let rows = to_export_rows(entries, TEST_TIMEZONE);

        let dates: Vec<&str> = rows.iter().map(|row| row.created_at.as_str()).collect();
        assert_eq!(
            dates,
            ["01/03/2024 23:30", "20/02/2024 09:00", "10/01/2024 12:00"]
        );
        assert_eq!(rows[0].amount, 10.5);
        assert_eq!(rows[0].member_name, "Maria");
    }

    fn read_sheet(bytes: Vec<u8>) -> (Vec<String>, Vec<Vec<Data>>) {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let names = workbook.sheet_names();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        (names, range.rows().map(<[Data]>::to_vec).collect())
    }

    fn text(value: &str) -> Data {
        Data::String(value.to_owned())
    }

    #[test]
    fn workbook_has_header_and_one_row_per_entry() {
        let rows = [
            ExportRow {
                created_at: "01/03/2024 23:30".to_owned(),
                order_number: "OS-7".to_owned(),
                member_name: "Maria".to_owned(),
                establishment_name: "Padaria".to_owned(),
                amount: 10.5,
                description: "Pão".to_owned(),
            },
            ExportRow {
                created_at: "20/02/2024 09:00".to_owned(),
                order_number: "OS-3".to_owned(),
                member_name: "João".to_owned(),
                establishment_name: "Farmácia".to_owned(),
                amount: 7.0,
                description: String::new(),
            },
        ];

        let (names, sheet) = read_sheet(write_workbook(&rows).unwrap());

        assert_eq!(names, [SHEET_NAME]);
        assert_eq!(sheet.len(), 3);
        let header: Vec<Data> = COLUMNS.iter().map(|(header, _)| text(header)).collect();
        assert_eq!(sheet[0], header);
        assert_eq!(
            sheet[1],
            [
                text("01/03/2024 23:30"),
                text("OS-7"),
                text("Maria"),
                text("Padaria"),
                Data::Float(10.5),
                text("Pão"),
            ]
        );
        assert_eq!(sheet[2][2], text("João"));
        assert_eq!(sheet[2][4], Data::Float(7.0));
    }

    #[test]
    fn empty_export_still_has_header() {
        let (names, sheet) = read_sheet(write_workbook(&[]).unwrap());

        assert_eq!(names, [SHEET_NAME]);
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet[0][0], text("Data (Brasília)"));
    }

    #[test]
    fn filename_uses_local_time() {
        let filename = export_filename(datetime!(2024-03-02 02:30 UTC), TEST_TIMEZONE);

        assert_eq!(filename, "lancamentos_20240301_2330.xlsx");
    }

    #[tokio::test]
    async fn responds_with_attachment() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::ZERO, &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);
        insert_entry(
            datetime!(2020-01-01 12:00 UTC),
            Money::from_reais(1),
            member,
            establishment,
            &connection,
        );
        let state = ExportState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: TEST_TIMEZONE.to_owned(),
        };

        let response = export_entries(
            State(state),
            Extension(admin_user()),
            Query(EntryQuery::default()),
        )
        .await
        .unwrap();

        assert_status_ok(&response);
        assert_content_type(&response, super::XLSX_CONTENT_TYPE);
        let disposition = get_header(&response, "content-disposition");
        assert!(disposition.starts_with("attachment; filename=\"lancamentos_"));
        assert!(disposition.ends_with(".xlsx\""));
    }

    #[tokio::test]
    async fn month_past_the_calendar_exports_everything() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::ZERO, &connection);
        let establishment = seed_establishment("Padaria", "padaria", &connection);
        let day = datetime!(2020-01-01 12:00 UTC);
        insert_entry(day, Money::from_reais(1), member, establishment, &connection);
        let state = ExportState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: TEST_TIMEZONE.to_owned(),
        };

        let response = export_entries(
            State(state),
            Extension(admin_user()),
            Query(EntryQuery {
                month: Some("9999-12".to_owned()),
                ..EntryQuery::default()
            }),
        )
        .await
        .unwrap();

        assert_status_ok(&response);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let (_, sheet) = read_sheet(bytes.to_vec());
        assert_eq!(sheet.len(), 2);
    }

    #[tokio::test]
    async fn establishment_export_is_scoped() {
        let connection = get_test_connection();
        let member = seed_member("Maria", "maria", Money::ZERO, &connection);
        let padaria = seed_establishment("Padaria", "padaria", &connection);
        let farmacia = seed_establishment("Farmácia", "farmacia", &connection);
        let first_day = datetime!(2020-01-01 12:00 UTC);
        insert_entry(first_day, Money::from_reais(1), member, padaria, &connection);
        let second_day = datetime!(2020-01-02 12:00 UTC);
        insert_entry(second_day, Money::from_reais(2), member, farmacia, &connection);

        let filter = EntryQuery::default()
            .to_filter(
                &establishment_user(padaria),
                crate::ledger::filter::DefaultPeriod::Everything,
                datetime!(2024-01-01 00:00 UTC),
                TEST_TIMEZONE,
            )
            .unwrap();
        let entries = query_entries(&filter, TEST_TIMEZONE, &connection).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].establishment_name, "Padaria");
    }
}
