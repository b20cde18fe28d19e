//! Scripts evaluated inside tender pages.

/// Ask the DataTables grid to render every row, either through its API or by
/// picking the largest page-size option. Returns whether anything changed.
pub const SHOW_ALL_ROWS_SCRIPT: &str = r#"
(() => {
    let changed = false;
    if (typeof jQuery !== 'undefined' && jQuery.fn && jQuery.fn.dataTable) {
        const tables = jQuery('table.dataTable');
        if (tables.length > 0) {
            tables.DataTable().page.len(-1).draw();
            changed = true;
        }
    }
    const select = document.querySelector('.dataTables_length select, select[name*="length"]');
    if (select && select.options.length > 0) {
        const last = select.options[select.options.length - 1];
        select.value = last.value;
        select.dispatchEvent(new Event('change', { bubbles: true }));
        changed = true;
    }
    return changed;
})()
"#;

/// Scrape the goods/services grid into an array of row objects.
///
/// Locates the card titled "Mal/Hizmet Listesi", else a tab pane mentioning
/// Kalem and Miktar, else the whole document; prefers a DataTables table.
/// Header folding and row validity match the static table extractor.
pub const TABLE_SCRAPE_SCRIPT: &str = r#"
(() => {
    const fold = (text) => text
        .replace(/İ/g, 'i')
        .toLowerCase()
        .replace(/ı/g, 'i').replace(/ö/g, 'o').replace(/ü/g, 'u')
        .replace(/ş/g, 's').replace(/ç/g, 'c').replace(/ğ/g, 'g')
        .trim()
        .replace(/\s+/g, '_');

    let scope = null;
    for (const card of document.querySelectorAll('.card')) {
        const header = card.querySelector('.card-header');
        if (header && header.textContent.includes('Mal/Hizmet Listesi')) {
            scope = card;
            break;
        }
    }
    if (!scope) {
        for (const pane of document.querySelectorAll('.tab-pane, [id*="mal"], [id*="hizmet"]')) {
            if (pane.innerHTML.includes('Kalem') && pane.innerHTML.includes('Miktar')) {
                scope = pane;
                break;
            }
        }
    }
    if (!scope) {
        scope = document;
    }

    const table = scope.querySelector('table.dataTable, table[id*="DataTable"], .dataTables_wrapper table')
        || scope.querySelector('table');
    if (!table) {
        return [];
    }

    let headers = [];
    const headerRow = table.querySelector('thead tr');
    if (headerRow) {
        headerRow.querySelectorAll('th').forEach((th) => {
            const text = th.textContent.trim();
            headers.push(text === '#' ? 'sira' : (text ? fold(text) : null));
        });
    }
    if (headers.length === 0 || headers.every((h) => !h)) {
        headers = ['sira', 'kalem', 'miktar', 'birim'];
    }
    const standard = ['sira', 'kalem', 'miktar', 'birim', 'aciklama'];

    const rows = [];
    table.querySelectorAll('tbody tr').forEach((tr) => {
        const cells = tr.querySelectorAll('td');
        if (cells.length === 0) {
            return;
        }
        const row = {};
        let hasData = false;
        cells.forEach((td, idx) => {
            const value = td.textContent.replace(/\s+/g, ' ').trim();
            const key = headers[idx] || standard[idx] || ('col_' + idx);
            if (value) {
                row[key] = value;
                if (key !== 'sira') {
                    hasData = true;
                }
            }
        });
        if (hasData && Object.keys(row).length >= 2) {
            rows.push(row);
        }
    });
    return rows;
})()
"#;
